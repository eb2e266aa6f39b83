/// Process-wide shutdown state and the stop-sentinel watcher.
///
/// The state machine is `Running -> Draining -> Stopped`, one way only.
/// Components never poll the filesystem for the sentinel themselves: the
/// sentinel watcher flips the shared state once, and the flip is broadcast
/// by closing a crossbeam channel every component can block on.
///
/// # Broadcast
///
/// [`ShutdownSignal`] keeps the only `Sender` of a zero-capacity channel.
/// Leaving `Running` drops that sender, so every `recv` / `recv_timeout` on
/// the listener returns `Disconnected` at once. Sleeping components wake
/// immediately instead of finishing their poll interval.
use crate::error::ChannelError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle of one runtime instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ShutdownState {
    /// Watchers dispatch new files.
    Running = 0,
    /// Shutdown requested: in-flight handler calls finish, nothing new starts.
    Draining = 1,
    /// Every watcher and background task has been joined.
    Stopped = 2,
}

impl ShutdownState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ShutdownState::Running,
            1 => ShutdownState::Draining,
            _ => ShutdownState::Stopped,
        }
    }
}

impl fmt::Display for ShutdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownState::Running => "running",
            ShutdownState::Draining => "draining",
            ShutdownState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

struct Inner {
    state: AtomicU8,
    /// Dropped on the first transition out of `Running`.
    trigger: Mutex<Option<Sender<()>>>,
    listener: Receiver<()>,
}

/// Cheaply cloneable handle to the shared shutdown state.
#[derive(Clone)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("state", &self.state())
            .finish()
    }
}

impl ShutdownSignal {
    /// A fresh signal in the `Running` state.
    pub fn new() -> Self {
        let (tx, rx) = bounded::<()>(0);
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(ShutdownState::Running as u8),
                trigger: Mutex::new(Some(tx)),
                listener: rx,
            }),
        }
    }

    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// `true` once the state has left `Running`.
    pub fn is_draining(&self) -> bool {
        self.state() >= ShutdownState::Draining
    }

    /// Move `Running -> Draining` and wake every waiter.
    ///
    /// Returns `true` only for the call that performed the transition; later
    /// calls (from the sentinel or anywhere else) are no-ops.
    pub fn request(&self) -> bool {
        let flipped = self
            .inner
            .state
            .compare_exchange(
                ShutdownState::Running as u8,
                ShutdownState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if flipped {
            // Dropping the sender disconnects every listener.
            self.inner.trigger.lock().take();
            info!(state = %ShutdownState::Draining, "shutdown requested");
        }
        flipped
    }

    /// Move `Draining -> Stopped`. Only the dispatcher calls this, after it
    /// has joined everything it started.
    pub(crate) fn mark_stopped(&self) -> bool {
        let stopped = self
            .inner
            .state
            .compare_exchange(
                ShutdownState::Draining as u8,
                ShutdownState::Stopped as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if stopped {
            info!(state = %ShutdownState::Stopped, "runtime stopped");
        }
        stopped
    }

    /// Receiver that disconnects when the state leaves `Running`.
    ///
    /// Use it in a `crossbeam_channel::select!` next to other event sources.
    pub fn listener(&self) -> &Receiver<()> {
        &self.inner.listener
    }

    /// Sleep for up to `timeout`, waking early on shutdown.
    ///
    /// Returns `true` if the runtime is draining.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.listener.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            // Nothing is ever sent; a timeout means still running.
            Err(RecvTimeoutError::Timeout) | Ok(()) => self.is_draining(),
        }
    }

    /// Block until the state leaves `Running`.
    pub fn wait(&self) {
        while !self.is_draining() {
            let _ = self.inner.listener.recv();
        }
    }
}

// ─── Sentinel watcher ───────────────────────────────────────────────────────

/// Start the thread that turns the appearance of `sentinel` into a shutdown
/// request.
///
/// The sentinel's content is ignored. The thread exits after requesting
/// shutdown, or as soon as shutdown is requested by someone else.
pub fn start_sentinel_watcher(
    sentinel: PathBuf,
    interval: Duration,
    signal: ShutdownSignal,
) -> Result<JoinHandle<()>, ChannelError> {
    let name = "chanwatch-sentinel".to_owned();
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || run_sentinel_watcher(sentinel, interval, signal))
        .map_err(|source| ChannelError::Spawn { name, source })
}

fn run_sentinel_watcher(sentinel: PathBuf, interval: Duration, signal: ShutdownSignal) {
    debug!(sentinel = %sentinel.display(), "sentinel watcher: starting");

    loop {
        match sentinel.try_exists() {
            Ok(true) => {
                info!(sentinel = %sentinel.display(), "stop sentinel observed");
                signal.request();
                break;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(sentinel = %sentinel.display(), error = %e, "sentinel check failed");
            }
        }

        if signal.wait_timeout(interval) {
            break;
        }
    }

    debug!(sentinel = %sentinel.display(), "sentinel watcher: stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    #[test]
    fn new_signal_is_running() {
        let signal = ShutdownSignal::new();
        assert_eq!(signal.state(), ShutdownState::Running);
        assert!(!signal.is_draining());
    }

    /// Only the first request performs the transition.
    #[test]
    fn request_is_idempotent() {
        let signal = ShutdownSignal::new();
        assert!(signal.request());
        assert!(!signal.request());
        assert_eq!(signal.state(), ShutdownState::Draining);
    }

    /// `Stopped` is only reachable through `Draining`, and nothing leads back
    /// to `Running`.
    #[test]
    fn state_machine_is_one_way() {
        let signal = ShutdownSignal::new();
        assert!(!signal.mark_stopped(), "cannot stop while running");
        assert_eq!(signal.state(), ShutdownState::Running);

        signal.request();
        assert!(signal.mark_stopped());
        assert_eq!(signal.state(), ShutdownState::Stopped);

        assert!(!signal.request());
        assert!(!signal.mark_stopped());
        assert_eq!(signal.state(), ShutdownState::Stopped);
    }

    /// A long wait is cut short by a request from another thread.
    #[test]
    fn request_wakes_waiters_on_every_clone() {
        let signal = ShutdownSignal::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let s = signal.clone();
                thread::spawn(move || {
                    let start = Instant::now();
                    let draining = s.wait_timeout(Duration::from_secs(30));
                    (draining, start.elapsed())
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        signal.request();

        for w in waiters {
            let (draining, elapsed) = w.join().unwrap();
            assert!(draining);
            assert!(elapsed < Duration::from_secs(10), "waiter woke late: {elapsed:?}");
        }
    }

    #[test]
    fn wait_timeout_reports_running_on_timeout() {
        let signal = ShutdownSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn sentinel_file_requests_shutdown() {
        let tmp = TempDir::new().unwrap();
        let stop = tmp.path().join("stop");
        let signal = ShutdownSignal::new();
        let handle =
            start_sentinel_watcher(stop.clone(), Duration::from_millis(10), signal.clone())
                .unwrap();

        thread::sleep(Duration::from_millis(30));
        assert!(!signal.is_draining());

        std::fs::write(&stop, b"ignored").unwrap();
        handle.join().unwrap();
        assert_eq!(signal.state(), ShutdownState::Draining);
    }

    /// The sentinel thread also exits when shutdown arrives from elsewhere.
    #[test]
    fn sentinel_watcher_exits_on_external_request() {
        let tmp = TempDir::new().unwrap();
        let signal = ShutdownSignal::new();
        let handle = start_sentinel_watcher(
            tmp.path().join("never"),
            Duration::from_secs(60),
            signal.clone(),
        )
        .unwrap();

        signal.request();
        handle.join().unwrap();
    }
}
