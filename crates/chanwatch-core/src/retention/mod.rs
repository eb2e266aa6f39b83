/// Retention sweeper — keeps derived-artifact directories bounded.
///
/// Each sweep lists a directory, orders its files by modification time
/// (oldest first, ties broken by file name) and deletes the oldest ones
/// until at most `capacity` remain. Between sweeps a directory may hold
/// more than `capacity` files; after a completed sweep it does not, unless
/// a deletion failed.
///
/// The sweeper only ever deletes. It must be pointed at directories whose
/// files nobody still needs (rendered images referenced by older outputs),
/// never at the authoritative outbound channel directories.
///
/// # Lifecycle
///
/// [`RetentionSweeper::start`] returns a [`SweeperHandle`]. The dispatcher
/// calls [`SweeperHandle::finish`] once every watcher has drained; the
/// sweeper then runs one final cycle and exits, so the bound holds at
/// process exit too.
use crate::error::ChannelError;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Outcome of sweeping one directory once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub directory: PathBuf,
    /// Files left after the sweep (including ones whose deletion failed).
    pub retained: usize,
    pub evicted: usize,
    pub failed: usize,
}

/// Running totals across all cycles of one sweeper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepTotals {
    pub cycles: u64,
    pub evicted: u64,
    pub failed: u64,
}

impl SweepTotals {
    fn record(&mut self, reports: &[SweepReport]) {
        self.cycles += 1;
        for r in reports {
            self.evicted += r.evicted as u64;
            self.failed += r.failed as u64;
        }
    }
}

/// A file under retention.
struct Member {
    modified: SystemTime,
    name: OsString,
    path: PathBuf,
}

/// Oldest first; equal timestamps fall back to lexical file-name order so
/// coarse mtime resolution still gives a deterministic result.
fn eviction_order(a: &Member, b: &Member) -> Ordering {
    a.modified
        .cmp(&b.modified)
        .then_with(|| a.name.cmp(&b.name))
}

fn list_members(dir: &Path) -> io::Result<Vec<Member>> {
    let mut members = Vec::new();
    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        members.push(Member {
            // Files without an mtime sort first and are evicted first.
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            name: entry.file_name(),
            path: entry.path(),
        });
    }
    Ok(members)
}

/// Sweep `dir` once, keeping the `capacity` most recently modified files.
///
/// Individual deletion failures are logged and counted, never fatal. A
/// file that vanished on its own before deletion counts as evicted.
pub fn sweep_directory(dir: &Path, capacity: usize) -> io::Result<SweepReport> {
    sweep_directory_with(dir, capacity, |path| fs::remove_file(path))
}

fn sweep_directory_with(
    dir: &Path,
    capacity: usize,
    remove: impl Fn(&Path) -> io::Result<()>,
) -> io::Result<SweepReport> {
    let mut members = list_members(dir)?;
    let total = members.len();
    let mut report = SweepReport {
        directory: dir.to_path_buf(),
        retained: total,
        evicted: 0,
        failed: 0,
    };
    if total <= capacity {
        return Ok(report);
    }

    members.sort_by(eviction_order);
    for member in &members[..total - capacity] {
        match remove(&member.path) {
            Ok(()) => report.evicted += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => report.evicted += 1,
            Err(e) => {
                report.failed += 1;
                warn!(path = %member.path.display(), error = %e, "retention: delete failed");
            }
        }
    }
    report.retained = total - report.evicted;

    debug!(
        dir = %dir.display(),
        evicted = report.evicted,
        retained = report.retained,
        "retention sweep"
    );
    Ok(report)
}

/// Bounds a fixed set of directories on a fixed interval.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    directories: Vec<PathBuf>,
    capacity: usize,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(directories: Vec<PathBuf>, capacity: usize, interval: Duration) -> Self {
        Self {
            directories,
            capacity,
            interval,
        }
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Sweep every directory once, in parallel. A directory that cannot be
    /// listed is logged and skipped for this cycle.
    pub fn sweep_once(&self) -> Vec<SweepReport> {
        self.directories
            .par_iter()
            .filter_map(|dir| match sweep_directory(dir, self.capacity) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "retention: cannot list directory");
                    None
                }
            })
            .collect()
    }

    /// Run on a background thread until [`SweeperHandle::finish`].
    pub fn start(self) -> Result<SweeperHandle, ChannelError> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let name = "chanwatch-retention".to_owned();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run(stop_rx))
            .map_err(|source| ChannelError::Spawn { name, source })?;

        Ok(SweeperHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    fn run(self, stop: Receiver<()>) -> SweepTotals {
        info!(
            directories = self.directories.len(),
            capacity = self.capacity,
            "retention sweeper started"
        );
        let mut totals = SweepTotals::default();

        loop {
            totals.record(&self.sweep_once());
            select! {
                recv(stop) -> _ => break,
                default(self.interval) => {}
            }
        }

        // Final pass so the bound also holds for whatever the draining
        // handlers wrote last.
        totals.record(&self.sweep_once());
        info!(
            cycles = totals.cycles,
            evicted = totals.evicted,
            failed = totals.failed,
            "retention sweeper stopped"
        );
        totals
    }
}

/// Handle to a running sweeper thread.
pub struct SweeperHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<SweepTotals>>,
}

impl SweeperHandle {
    /// Ask for a final sweep, wait for it, and return the totals.
    pub fn finish(mut self) -> SweepTotals {
        self.join()
    }

    fn join(&mut self) -> SweepTotals {
        // Disconnecting the stop channel wakes the sweeper immediately.
        self.stop.take();
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(totals)) => totals,
            Some(Err(_)) => {
                warn!("retention sweeper thread panicked");
                SweepTotals::default()
            }
            None => SweepTotals::default(),
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Create `name` with an explicit modification time `secs` after the epoch.
    fn file_at(dir: &Path, name: &str, secs: u64) {
        let path = dir.join(name);
        let f = fs::File::create(&path).unwrap();
        f.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut v: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        v.sort();
        v
    }

    /// Capacity 10 over 15 files with distinct mtimes: the 10 newest stay.
    #[test]
    fn keeps_the_newest_capacity_files() {
        let tmp = TempDir::new().unwrap();
        for i in 0..15u64 {
            // Names deliberately out of mtime order.
            file_at(tmp.path(), &format!("img{:02}.jpg", 14 - i), 1_000 + i);
        }

        let report = sweep_directory(tmp.path(), 10).unwrap();
        assert_eq!(report.evicted, 5);
        assert_eq!(report.retained, 10);
        assert_eq!(report.failed, 0);

        // Files written first (highest names here) are the oldest.
        let expected: Vec<String> = (0..10).map(|i| format!("img{i:02}.jpg")).collect();
        assert_eq!(names(tmp.path()), expected);
    }

    /// With identical mtimes, the lexically smallest names go first.
    #[test]
    fn ties_are_broken_by_name() {
        let tmp = TempDir::new().unwrap();
        for name in ["c.jpg", "a.jpg", "d.jpg", "b.jpg"] {
            file_at(tmp.path(), name, 5_000);
        }
        sweep_directory(tmp.path(), 2).unwrap();
        assert_eq!(names(tmp.path()), ["c.jpg", "d.jpg"]);
    }

    #[test]
    fn under_capacity_is_untouched() {
        let tmp = TempDir::new().unwrap();
        file_at(tmp.path(), "only.jpg", 1);
        let report = sweep_directory(tmp.path(), 10).unwrap();
        assert_eq!(report.evicted, 0);
        assert_eq!(report.retained, 1);
    }

    /// Subdirectories are neither counted nor deleted.
    #[test]
    fn subdirectories_are_ignored() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("keep")).unwrap();
        file_at(tmp.path(), "a.jpg", 1);
        file_at(tmp.path(), "b.jpg", 2);
        sweep_directory(tmp.path(), 1).unwrap();
        assert_eq!(names(tmp.path()), ["b.jpg", "keep"]);
    }

    /// A failed deletion is counted and the file stays in `retained`; the
    /// sweep still goes on to the next candidate. A file that vanished
    /// under us counts as evicted.
    #[test]
    fn failed_deletions_are_counted_and_skipped() {
        let tmp = TempDir::new().unwrap();
        for i in 0..5u64 {
            file_at(tmp.path(), &format!("{i}.jpg"), 10 + i);
        }

        let report = sweep_directory_with(tmp.path(), 2, |path| {
            match path.file_name().and_then(|n| n.to_str()) {
                Some("0.jpg") => Err(io::Error::from(io::ErrorKind::PermissionDenied)),
                Some("1.jpg") => Err(io::Error::from(io::ErrorKind::NotFound)),
                _ => fs::remove_file(path),
            }
        })
        .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.evicted, 2);
        assert_eq!(report.retained, 3);
        assert_eq!(names(tmp.path()), ["0.jpg", "1.jpg", "3.jpg", "4.jpg"]);
    }

    /// A missing directory is skipped by `sweep_once`, the others still run.
    #[test]
    fn sweep_once_skips_unlistable_directories() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good");
        fs::create_dir(&good).unwrap();
        for i in 0..4 {
            file_at(&good, &format!("{i}.jpg"), i);
        }

        let sweeper = RetentionSweeper::new(
            vec![tmp.path().join("missing"), good.clone()],
            2,
            Duration::from_secs(1),
        );
        let reports = sweeper.sweep_once();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].directory, good);
        assert_eq!(names(&good), ["2.jpg", "3.jpg"]);
    }

    /// `finish` triggers a last sweep that catches files added after the
    /// previous cycle.
    #[test]
    fn finish_runs_a_final_sweep() {
        let tmp = TempDir::new().unwrap();
        let sweeper =
            RetentionSweeper::new(vec![tmp.path().to_path_buf()], 3, Duration::from_secs(3600));
        let handle = sweeper.start().unwrap();

        for i in 0..6 {
            file_at(tmp.path(), &format!("{i}.jpg"), 100 + i);
        }
        let totals = handle.finish();

        assert!(totals.cycles >= 2);
        assert_eq!(names(tmp.path()), ["3.jpg", "4.jpg", "5.jpg"]);
    }
}
