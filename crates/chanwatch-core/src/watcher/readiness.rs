/// File readiness policy: a file is dispatched only after its size has
/// stayed the same across two observations at least `quiescence` apart.
///
/// This keeps half-written files away from handlers without needing any
/// cooperation from the writer. The tracker is pure bookkeeping; callers
/// supply the observations and the clock, which keeps it testable.
use crate::model::FileObservation;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Pending {
    size: u64,
    /// When `size` was first observed at its current value.
    stable_since: Instant,
}

/// Tracks not-yet-ready files for one directory.
#[derive(Debug)]
pub struct ReadinessTracker {
    quiescence: Duration,
    pending: HashMap<PathBuf, Pending>,
}

impl ReadinessTracker {
    pub fn new(quiescence: Duration) -> Self {
        Self {
            quiescence,
            pending: HashMap::new(),
        }
    }

    pub fn quiescence(&self) -> Duration {
        self.quiescence
    }

    /// Number of files seen but not yet ready.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feed one directory scan taken at `now`; returns the files that just
    /// became ready, oldest-stable first.
    ///
    /// - A path seen for the first time is never ready on that scan.
    /// - A size change restarts the quiescence clock.
    /// - Paths missing from the scan are forgotten.
    /// - A returned file is no longer tracked; callers that want to skip
    ///   already-dispatched files must filter them out before calling.
    pub fn observe(
        &mut self,
        observations: Vec<FileObservation>,
        now: Instant,
    ) -> Vec<FileObservation> {
        let mut seen: HashSet<PathBuf> = HashSet::with_capacity(observations.len());
        let mut ready: Vec<(Instant, FileObservation)> = Vec::new();

        for obs in observations {
            seen.insert(obs.path.clone());
            match self.pending.get_mut(&obs.path) {
                None => {
                    self.pending.insert(
                        obs.path.clone(),
                        Pending {
                            size: obs.size,
                            stable_since: now,
                        },
                    );
                }
                Some(p) if p.size != obs.size => {
                    p.size = obs.size;
                    p.stable_since = now;
                }
                Some(p) => {
                    if now.saturating_duration_since(p.stable_since) >= self.quiescence {
                        ready.push((p.stable_since, obs));
                    }
                }
            }
        }

        for (_, obs) in &ready {
            self.pending.remove(&obs.path);
        }
        self.pending.retain(|path, _| seen.contains(path));

        ready.sort_by(|(a_since, a), (b_since, b)| {
            a_since
                .cmp(b_since)
                .then_with(|| a.modified.cmp(&b.modified))
                .then_with(|| a.path.cmp(&b.path))
        });
        ready.into_iter().map(|(_, obs)| obs).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(name: &str, size: u64) -> FileObservation {
        FileObservation {
            path: PathBuf::from(format!("/feed/{name}")),
            size,
            modified: None,
        }
    }

    fn names(ready: &[FileObservation]) -> Vec<String> {
        ready
            .iter()
            .map(|o| o.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    const Q: Duration = Duration::from_millis(100);

    /// `photo.jpg` at 1024 then 1024 one interval later is ready;
    /// `photo2.jpg` at 1024 then 2048 is not.
    #[test]
    fn stable_file_is_ready_growing_file_is_not() {
        let mut tracker = ReadinessTracker::new(Q);
        let t0 = Instant::now();

        let first = tracker.observe(vec![obs("photo.jpg", 1024), obs("photo2.jpg", 1024)], t0);
        assert!(first.is_empty(), "first sighting is never ready");

        let second = tracker.observe(
            vec![obs("photo.jpg", 1024), obs("photo2.jpg", 2048)],
            t0 + Q,
        );
        assert_eq!(names(&second), ["photo.jpg"]);
        assert_eq!(tracker.pending_len(), 1);

        // photo2 stabilises at 2048 and becomes ready one interval later.
        let third = tracker.observe(vec![obs("photo2.jpg", 2048)], t0 + Q * 2);
        assert_eq!(names(&third), ["photo2.jpg"]);
        assert_eq!(tracker.pending_len(), 0);
    }

    /// Two observations closer together than the quiescence interval are
    /// not enough.
    #[test]
    fn quiescence_interval_must_elapse() {
        let mut tracker = ReadinessTracker::new(Q);
        let t0 = Instant::now();
        tracker.observe(vec![obs("a.json", 10)], t0);
        assert!(tracker.observe(vec![obs("a.json", 10)], t0 + Q / 2).is_empty());
        assert_eq!(names(&tracker.observe(vec![obs("a.json", 10)], t0 + Q)), ["a.json"]);
    }

    /// Every size change restarts the clock from that observation.
    #[test]
    fn size_change_resets_quiescence() {
        let mut tracker = ReadinessTracker::new(Q);
        let t0 = Instant::now();
        tracker.observe(vec![obs("big.bin", 1)], t0);
        tracker.observe(vec![obs("big.bin", 2)], t0 + Q);
        tracker.observe(vec![obs("big.bin", 3)], t0 + Q * 2);
        assert!(tracker
            .observe(vec![obs("big.bin", 3)], t0 + Q * 2 + Q / 2)
            .is_empty());
        assert_eq!(
            names(&tracker.observe(vec![obs("big.bin", 3)], t0 + Q * 3)),
            ["big.bin"]
        );
    }

    #[test]
    fn vanished_files_are_forgotten() {
        let mut tracker = ReadinessTracker::new(Q);
        let t0 = Instant::now();
        tracker.observe(vec![obs("gone.json", 5)], t0);
        tracker.observe(vec![], t0 + Q);
        assert_eq!(tracker.pending_len(), 0);

        // Reappearing counts as a first sighting again.
        assert!(tracker.observe(vec![obs("gone.json", 5)], t0 + Q * 2).is_empty());
    }

    /// Files that became stable earlier come out first; ties fall back to
    /// the path.
    #[test]
    fn ready_files_are_ordered_by_stability_then_name() {
        let mut tracker = ReadinessTracker::new(Q);
        let t0 = Instant::now();
        tracker.observe(vec![obs("b.json", 1), obs("a.json", 1)], t0);
        tracker.observe(vec![obs("b.json", 1), obs("a.json", 1), obs("c.json", 1)], t0 + Q / 2);

        let ready = tracker.observe(
            vec![obs("c.json", 1), obs("b.json", 1), obs("a.json", 1)],
            t0 + Q * 2,
        );
        assert_eq!(names(&ready), ["a.json", "b.json", "c.json"]);
    }

    /// An empty file is as dispatchable as any other once it is stable.
    #[test]
    fn empty_file_becomes_ready() {
        let mut tracker = ReadinessTracker::new(Q);
        let t0 = Instant::now();
        tracker.observe(vec![obs("empty", 0)], t0);
        assert_eq!(names(&tracker.observe(vec![obs("empty", 0)], t0 + Q)), ["empty"]);
    }
}
