/// Plugin startup errors. Everything here happens before the runtime
/// starts; handler failures never surface as a `PluginError`.
use chanwatch_core::{ChannelId, ConfigError, Direction, StartupError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("failed to read request file {}: {source}", path.display())]
    ReadRequest {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed request file {}: {source}", path.display())]
    ParseRequest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("request file has no telemetry feed")]
    MissingTelemetryFeed,

    #[error("telemetry feed has no camera image folder")]
    MissingCameraFolder,

    #[error("request file has no {direction} channel with id {id}")]
    UnknownChannel { id: ChannelId, direction: Direction },

    #[error("failed to create folder {}: {source}", path.display())]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Startup(#[from] StartupError),
}

impl PluginError {
    /// `true` for problems with the request, the folder layout or the
    /// runtime settings, as opposed to failures starting threads or hooks.
    pub fn is_config(&self) -> bool {
        !matches!(
            self,
            PluginError::Startup(StartupError::Channel(_) | StartupError::Init(_))
        )
    }

    /// Process exit code: 2 for configuration errors, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.is_config() {
            2
        } else {
            1
        }
    }
}

impl From<ConfigError> for PluginError {
    fn from(e: ConfigError) -> Self {
        PluginError::Startup(StartupError::Config(e))
    }
}
