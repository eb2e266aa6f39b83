/// Channel watcher — one thread per inbound channel directory.
///
/// Each cycle the watcher lists its directory, feeds the listing through
/// the [`ReadinessTracker`], and hands every newly-ready file to its
/// handler, one at a time, on its own thread. Handlers of different
/// channels run in parallel; a single channel's handler is never re-entered.
///
/// # At-most-once
///
/// Dispatched files are remembered by [`FileIdentity`] (path + mtime) for
/// the lifetime of the watcher. The set lives in memory only: a restarted
/// process dispatches files already present at startup again. Identities of
/// files that have left the directory are pruned so the set stays bounded
/// by the directory size.
///
/// # Cancellation
///
/// Shutdown is checked between cycles and before every dispatch. A handler
/// call that has started always runs to completion; once draining is seen,
/// no new call starts even if ready files remain.
pub mod observer;
pub mod readiness;

pub use observer::{
    build_observer, scan_directory, DirectoryObserver, NativeObserver, ObserverKind, PollObserver,
};
pub use readiness::ReadinessTracker;

use crate::error::ChannelError;
use crate::handler::{self, Handler};
use crate::model::{Channel, ChannelId, FileIdentity, FileObservation, Message};
use crate::shutdown::ShutdownSignal;
use compact_str::CompactString;
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Why a watcher loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherExit {
    /// Shutdown was requested and the last handler call returned.
    Drained,
    /// The watched directory disappeared; only this channel stopped.
    DirectoryLost,
    /// The watcher thread itself panicked (never a handler panic).
    Panicked,
}

impl fmt::Display for WatcherExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatcherExit::Drained => f.write_str("drained"),
            WatcherExit::DirectoryLost => f.write_str("directory lost"),
            WatcherExit::Panicked => f.write_str("panicked"),
        }
    }
}

/// Per-channel summary returned when a watcher stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherReport {
    pub channel: ChannelId,
    pub label: CompactString,
    /// Handler invocations, successful or not.
    pub dispatched: u64,
    /// Invocations that returned an error or panicked.
    pub failed: u64,
    pub exit: WatcherExit,
}

/// Timing for one watcher.
#[derive(Debug, Clone, Copy)]
pub struct WatcherOptions {
    pub poll_interval: Duration,
    pub quiescence: Duration,
}

/// Owns one inbound channel: its observer, its handler and its
/// dispatched-set.
pub struct ChannelWatcher {
    channel: Channel,
    observer: Box<dyn DirectoryObserver>,
    handler: Box<dyn Handler>,
    readiness: ReadinessTracker,
    dispatched: HashSet<FileIdentity>,
    poll_interval: Duration,
    report: WatcherReport,
}

impl ChannelWatcher {
    pub fn new(
        channel: Channel,
        observer: Box<dyn DirectoryObserver>,
        handler: Box<dyn Handler>,
        options: WatcherOptions,
    ) -> Self {
        let report = WatcherReport {
            channel: channel.id,
            label: channel.label.clone(),
            dispatched: 0,
            failed: 0,
            exit: WatcherExit::Drained,
        };
        Self {
            channel,
            observer,
            handler,
            readiness: ReadinessTracker::new(options.quiescence),
            dispatched: HashSet::new(),
            poll_interval: options.poll_interval,
            report,
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Run the watcher on a dedicated, named thread.
    pub fn spawn(self, shutdown: ShutdownSignal) -> Result<JoinHandle<WatcherReport>, ChannelError> {
        let name = format!("chanwatch-ch{}-{}", self.channel.id, self.channel.label);
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run(&shutdown))
            .map_err(|source| ChannelError::Spawn { name, source })
    }

    /// Watch until shutdown or until the directory disappears.
    pub fn run(mut self, shutdown: &ShutdownSignal) -> WatcherReport {
        info!(
            channel = self.channel.id,
            label = %self.channel.label,
            dir = %self.channel.path.display(),
            observer = %self.observer.kind(),
            "watcher started"
        );

        loop {
            if shutdown.is_draining() {
                self.report.exit = WatcherExit::Drained;
                break;
            }
            if let Err(e) = self.poll_once(shutdown) {
                error!(
                    channel = self.channel.id,
                    path = %self.channel.path.display(),
                    error = %e,
                    "watcher stopping: channel failure"
                );
                self.report.exit = WatcherExit::DirectoryLost;
                break;
            }
            if shutdown.is_draining() {
                self.report.exit = WatcherExit::Drained;
                break;
            }
            self.observer.park(self.poll_interval, shutdown);
        }

        info!(
            channel = self.channel.id,
            label = %self.channel.label,
            dispatched = self.report.dispatched,
            failed = self.report.failed,
            exit = %self.report.exit,
            "watcher stopped"
        );
        self.report
    }

    /// One scan + dispatch cycle. Only a lost directory is an error.
    fn poll_once(&mut self, shutdown: &ShutdownSignal) -> Result<(), ChannelError> {
        let observations = match self.observer.scan() {
            Ok(o) => o,
            Err(e) if e.kind() == io::ErrorKind::NotFound || !self.channel.is_available() => {
                return Err(ChannelError::DirectoryLost {
                    id: self.channel.id,
                    path: self.channel.path.clone(),
                });
            }
            Err(e) => {
                warn!(
                    channel = self.channel.id,
                    path = %self.channel.path.display(),
                    error = %e,
                    "scan failed; retrying next cycle"
                );
                return Ok(());
            }
        };

        let present: HashSet<FileIdentity> =
            observations.iter().map(FileObservation::identity).collect();
        self.dispatched.retain(|id| present.contains(id));

        let candidates: Vec<FileObservation> = observations
            .into_iter()
            .filter(|o| !self.dispatched.contains(&o.identity()))
            .collect();

        for observation in self.readiness.observe(candidates, Instant::now()) {
            if shutdown.is_draining() {
                debug!(
                    channel = self.channel.id,
                    path = %observation.path.display(),
                    "draining; ready file left undispatched"
                );
                break;
            }
            self.dispatch(observation);
        }
        Ok(())
    }

    fn dispatch(&mut self, observation: FileObservation) {
        // The file may have been removed since the scan.
        if !observation.path.is_file() {
            warn!(
                channel = self.channel.id,
                path = %observation.path.display(),
                "message vanished before dispatch; skipped"
            );
            return;
        }

        self.dispatched.insert(observation.identity());
        let message = Message::from_observation(self.channel.id, observation);
        let started = Instant::now();
        self.report.dispatched += 1;

        match handler::invoke(self.handler.as_mut(), &message) {
            Ok(()) => debug!(
                channel = self.channel.id,
                path = %message.path.display(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "message handled"
            ),
            Err(e) => {
                self.report.failed += 1;
                error!(
                    channel = self.channel.id,
                    path = %message.path.display(),
                    error = %format!("{e:#}"),
                    "handler failed"
                );
            }
        }
    }
}

impl fmt::Debug for ChannelWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelWatcher")
            .field("channel", &self.channel)
            .field("observer", &self.observer.kind())
            .field("dispatched", &self.dispatched.len())
            .finish_non_exhaustive()
    }
}
