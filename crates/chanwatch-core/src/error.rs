/// Error types for the runtime.
///
/// Only configuration problems are fatal, and only at startup. Everything
/// that goes wrong after the watchers are running is logged and recovered
/// locally by the component that hit it.
use crate::model::{ChannelId, Direction};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid runtime configuration or channel layout, detected before any
/// watcher starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("channel {id} directory does not exist: {}", path.display())]
    MissingDirectory { id: ChannelId, path: PathBuf },

    #[error("channel {id} path is not a directory: {}", path.display())]
    NotADirectory { id: ChannelId, path: PathBuf },

    #[error("channel {id} is {actual} but only inbound channels can be watched")]
    NotInbound { id: ChannelId, actual: Direction },

    #[error("duplicate {direction} channel id {id}")]
    DuplicateId { id: ChannelId, direction: Direction },

    #[error("inbound channels {first} and {second} both claim {}", path.display())]
    SharedDirectory {
        first: ChannelId,
        second: ChannelId,
        path: PathBuf,
    },

    #[error("retention directory does not exist: {}", path.display())]
    MissingRetentionDirectory { path: PathBuf },

    #[error("no inbound channels configured")]
    NoInboundChannels,

    #[error("retention capacity must be at least 1")]
    ZeroCapacity,

    #[error("{name} must be non-zero")]
    ZeroInterval { name: &'static str },

    #[error("quiescence interval {quiescence:?} is shorter than the poll interval {poll:?}")]
    QuiescenceTooShort { quiescence: Duration, poll: Duration },

    #[error("unknown observer kind {0:?} (expected \"poll\" or \"native\")")]
    UnknownObserver(String),
}

/// Failure touching a channel directory or starting a runtime component.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel {id} directory disappeared: {}", path.display())]
    DirectoryLost { id: ChannelId, path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode payload for {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to start native observer on {}: {source}", path.display())]
    Observer {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl ChannelError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Anything that stops [`crate::ChannelDispatcher::run`] before the first
/// watcher is started.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("initialisation hook failed: {0:#}")]
    Init(anyhow::Error),
}
