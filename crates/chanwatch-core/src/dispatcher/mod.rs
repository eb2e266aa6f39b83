/// Channel dispatcher — starts the whole runtime as a unit and tears it
/// down in a fixed order.
///
/// Startup:
/// 1. validate the runtime config, the channel layout and retention dirs;
/// 2. build every observer (a native watch can fail here);
/// 3. run the one-time initialisation hook;
/// 4. start the sentinel watcher, the retention sweeper and one watcher
///    thread per inbound channel.
///
/// Any failure in 1-3 returns a [`StartupError`] before a single watcher
/// runs. Shutdown:
/// 1. wait for every watcher thread (each finishes its in-flight handler
///    call and exits on `Draining`);
/// 2. if every channel was lost before shutdown, keep waiting for it;
/// 3. finish the sweeper (final sweep), join the sentinel thread;
/// 4. move the state to `Stopped` and return the [`RunReport`].
use crate::config::{validate_retention_dirs, validate_watched_channels, RuntimeConfig};
use crate::error::{ChannelError, StartupError};
use crate::handler::Handler;
use crate::model::Channel;
use crate::retention::{RetentionSweeper, SweepTotals, SweeperHandle};
use crate::shutdown::{start_sentinel_watcher, ShutdownSignal, ShutdownState};
use crate::watcher::{build_observer, ChannelWatcher, WatcherExit, WatcherOptions, WatcherReport};
use std::fmt;
use std::path::PathBuf;
use std::thread::JoinHandle;
use tracing::{error, info, warn};

/// An inbound channel bound to the handler that consumes it.
pub struct ChannelSpec {
    pub channel: Channel,
    pub handler: Box<dyn Handler>,
}

impl ChannelSpec {
    pub fn new(channel: Channel, handler: impl Handler + 'static) -> Self {
        Self {
            channel,
            handler: Box::new(handler),
        }
    }
}

impl fmt::Debug for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSpec")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

/// Summary of one completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub watchers: Vec<WatcherReport>,
    pub retention: SweepTotals,
    pub final_state: ShutdownState,
}

impl RunReport {
    /// Exit code for the host: a run that reached `Stopped` is a success,
    /// even if individual handler calls or channels failed along the way.
    pub fn exit_code(&self) -> u8 {
        if self.final_state == ShutdownState::Stopped {
            0
        } else {
            1
        }
    }

    pub fn total_dispatched(&self) -> u64 {
        self.watchers.iter().map(|w| w.dispatched).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.watchers.iter().map(|w| w.failed).sum()
    }
}

/// Owns the runtime configuration and the shared shutdown state.
#[derive(Debug)]
pub struct ChannelDispatcher {
    config: RuntimeConfig,
    sentinel: PathBuf,
    retention_dirs: Vec<PathBuf>,
    shutdown: ShutdownSignal,
}

impl ChannelDispatcher {
    /// `sentinel` is the well-known path whose appearance stops the runtime.
    pub fn new(config: RuntimeConfig, sentinel: impl Into<PathBuf>) -> Self {
        Self {
            config,
            sentinel: sentinel.into(),
            retention_dirs: Vec::new(),
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Directories the retention sweeper keeps bounded.
    pub fn with_retention(mut self, dirs: Vec<PathBuf>) -> Self {
        self.retention_dirs = dirs;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Handle to the shared state, e.g. to request shutdown programmatically.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Run `channels` until shutdown, calling `init` exactly once after
    /// validation and before any watcher starts.
    pub fn run<I>(&self, channels: Vec<ChannelSpec>, init: I) -> Result<RunReport, StartupError>
    where
        I: FnOnce() -> anyhow::Result<()>,
    {
        if self.shutdown.state() == ShutdownState::Stopped {
            warn!("dispatcher already stopped; refusing to run again");
            return Ok(RunReport {
                watchers: Vec::new(),
                retention: SweepTotals::default(),
                final_state: ShutdownState::Stopped,
            });
        }

        self.config.validate()?;
        validate_watched_channels(channels.iter().map(|spec| &spec.channel))?;
        validate_retention_dirs(&self.retention_dirs)?;

        let options = WatcherOptions {
            poll_interval: self.config.poll_interval(),
            quiescence: self.config.quiescence(),
        };
        let mut watchers = Vec::with_capacity(channels.len());
        for spec in channels {
            let observer = build_observer(self.config.observer, spec.channel.path())?;
            watchers.push(ChannelWatcher::new(spec.channel, observer, spec.handler, options));
        }

        init().map_err(StartupError::Init)?;
        info!(channels = watchers.len(), "initialisation complete; starting watchers");

        let running = self.start(watchers)?;
        Ok(self.join(running))
    }

    fn start(&self, watchers: Vec<ChannelWatcher>) -> Result<Running, StartupError> {
        let mut running = Running::default();

        let started = (|| -> Result<(), ChannelError> {
            running.sentinel = Some(start_sentinel_watcher(
                self.sentinel.clone(),
                self.config.sentinel_poll(),
                self.shutdown.clone(),
            )?);
            if !self.retention_dirs.is_empty() {
                running.sweeper = Some(
                    RetentionSweeper::new(
                        self.retention_dirs.clone(),
                        self.config.retention_capacity,
                        self.config.sweep_interval(),
                    )
                    .start()?,
                );
            }
            for watcher in watchers {
                let channel = watcher.channel().clone();
                let handle = watcher.spawn(self.shutdown.clone())?;
                running.watchers.push((channel, handle));
            }
            Ok(())
        })();

        match started {
            Ok(()) => Ok(running),
            Err(e) => {
                error!(error = %e, "startup failed; stopping what already started");
                self.shutdown.request();
                self.join(running);
                Err(e.into())
            }
        }
    }

    fn join(&self, running: Running) -> RunReport {
        let Running {
            sentinel,
            sweeper,
            watchers,
        } = running;

        let mut reports = Vec::with_capacity(watchers.len());
        for (channel, handle) in watchers {
            let report = handle.join().unwrap_or_else(|_| {
                error!(channel = channel.id, "watcher thread panicked");
                WatcherReport {
                    channel: channel.id,
                    label: channel.label.clone(),
                    dispatched: 0,
                    failed: 0,
                    exit: WatcherExit::Panicked,
                }
            });
            reports.push(report);
        }

        // All channels may have been lost while still running.
        if !self.shutdown.is_draining() {
            warn!("no watcher left; waiting for the stop sentinel");
            self.shutdown.wait();
        }

        let retention = sweeper.map(|s| s.finish()).unwrap_or_default();
        if let Some(handle) = sentinel {
            if handle.join().is_err() {
                error!("sentinel watcher thread panicked");
            }
        }

        self.shutdown.mark_stopped();
        let report = RunReport {
            watchers: reports,
            retention,
            final_state: self.shutdown.state(),
        };
        info!(
            dispatched = report.total_dispatched(),
            failed = report.total_failed(),
            evicted = report.retention.evicted,
            "all channels stopped"
        );
        report
    }
}

/// Threads started by one run.
#[derive(Default)]
struct Running {
    sentinel: Option<JoinHandle<()>>,
    sweeper: Option<SweeperHandle>,
    watchers: Vec<(Channel, JoinHandle<WatcherReport>)>,
}
