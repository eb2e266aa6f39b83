/// Directory observers: how a watcher learns what is in its directory and
/// when to look again.
///
/// Two implementations share one contract:
///
/// - [`PollObserver`] — lists the directory on a fixed interval. Portable
///   baseline, works on network mounts and bind mounts where native events
///   are unreliable.
/// - [`NativeObserver`] — same listing, but wakes as soon as the OS reports
///   a change (inotify / FSEvents / ReadDirectoryChangesW via `notify`).
///   Events are only a hint; readiness is still decided by size stability,
///   and the poll interval stays as an upper bound so a file that stops
///   changing is re-checked without needing another event.
use crate::error::{ChannelError, ConfigError};
use crate::model::FileObservation;
use crate::shutdown::ShutdownSignal;
use crossbeam_channel::{bounded, select, Receiver};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Capacity of the event-hint channel. Hints are coalesced, so a full
/// channel only means a wake-up is already queued.
const EVENT_HINT_CAPACITY: usize = 64;

/// Which observer implementation to use for inbound directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObserverKind {
    #[default]
    Poll,
    Native,
}

impl fmt::Display for ObserverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverKind::Poll => f.write_str("poll"),
            ObserverKind::Native => f.write_str("native"),
        }
    }
}

impl FromStr for ObserverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poll" => Ok(ObserverKind::Poll),
            "native" => Ok(ObserverKind::Native),
            _ => Err(ConfigError::UnknownObserver(s.to_owned())),
        }
    }
}

/// Capability to enumerate one directory and wait for the next look.
pub trait DirectoryObserver: Send {
    fn kind(&self) -> ObserverKind;

    /// List the regular files currently in the directory.
    ///
    /// An `io::ErrorKind::NotFound` error means the directory itself is gone.
    fn scan(&mut self) -> io::Result<Vec<FileObservation>>;

    /// Block until the next scan is due: `interval` elapsed, a change was
    /// hinted, or shutdown was requested.
    fn park(&mut self, interval: Duration, shutdown: &ShutdownSignal);
}

/// Build the observer `kind` for `dir`.
pub fn build_observer(
    kind: ObserverKind,
    dir: &Path,
) -> Result<Box<dyn DirectoryObserver>, ChannelError> {
    match kind {
        ObserverKind::Poll => Ok(Box::new(PollObserver::new(dir))),
        ObserverKind::Native => Ok(Box::new(NativeObserver::start(dir)?)),
    }
}

/// List regular files directly inside `dir`.
///
/// Entries that vanish between the listing and their `stat` are skipped
/// silently; they were never ready. Subdirectories are ignored.
pub fn scan_directory(dir: &Path) -> io::Result<Vec<FileObservation>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "stat failed");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        files.push(FileObservation {
            path: entry.path(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
        });
    }
    Ok(files)
}

// ─── Poll ───────────────────────────────────────────────────────────────────

/// Interval-driven observer.
#[derive(Debug)]
pub struct PollObserver {
    dir: PathBuf,
}

impl PollObserver {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }
}

impl DirectoryObserver for PollObserver {
    fn kind(&self) -> ObserverKind {
        ObserverKind::Poll
    }

    fn scan(&mut self) -> io::Result<Vec<FileObservation>> {
        scan_directory(&self.dir)
    }

    fn park(&mut self, interval: Duration, shutdown: &ShutdownSignal) {
        shutdown.wait_timeout(interval);
    }
}

// ─── Native ─────────────────────────────────────────────────────────────────

/// Event-driven observer backed by the platform's recommended `notify`
/// watcher.
pub struct NativeObserver {
    dir: PathBuf,
    // Must stay alive; dropping it stops event delivery.
    _watcher: RecommendedWatcher,
    hints: Receiver<()>,
}

impl NativeObserver {
    /// Register a non-recursive watch on `dir`.
    pub fn start(dir: &Path) -> Result<Self, ChannelError> {
        let (tx, rx) = bounded::<()>(EVENT_HINT_CAPACITY);
        let watched = dir.to_path_buf();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        // Full channel: a wake-up is already pending.
                        let _ = tx.try_send(());
                    }
                }
                Err(e) => warn!(dir = %watched.display(), error = %e, "native observer error"),
            }
        })
        .map_err(|source| ChannelError::Observer {
            path: dir.to_path_buf(),
            source,
        })?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| ChannelError::Observer {
                path: dir.to_path_buf(),
                source,
            })?;

        debug!(dir = %dir.display(), "native observer registered");
        Ok(Self {
            dir: dir.to_path_buf(),
            _watcher: watcher,
            hints: rx,
        })
    }
}

impl fmt::Debug for NativeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObserver")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl DirectoryObserver for NativeObserver {
    fn kind(&self) -> ObserverKind {
        ObserverKind::Native
    }

    fn scan(&mut self) -> io::Result<Vec<FileObservation>> {
        scan_directory(&self.dir)
    }

    fn park(&mut self, interval: Duration, shutdown: &ShutdownSignal) {
        select! {
            recv(shutdown.listener()) -> _ => {}
            recv(self.hints) -> _ => {
                // Coalesce the burst that usually accompanies one write.
                while self.hints.try_recv().is_ok() {}
            }
            default(interval) => {}
        }
    }
}
