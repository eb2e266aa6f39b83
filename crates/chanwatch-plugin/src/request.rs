/// The plugin request file written by the host before launch.
///
/// ```json
/// {
///   "telemetryFeeds": [
///     { "cameraFeedsImageFolders": ["cam0"], "geolocationFolder": "geo" }
///   ],
///   "inputChannels":  [ { "id": 3, "folder": "ui" }, { "id": 4, "folder": "form" } ],
///   "outputChannels": [ { "id": 0, "folder": "detections" }, ... ],
///   "runtime": { "pollIntervalMs": 100 }
/// }
/// ```
///
/// Folder names are relative to the telemetry / input / output roots given
/// on the command line. Unknown fields are ignored.
use crate::error::PluginError;
use chanwatch_core::{ChannelId, Direction, RuntimeConfig};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// One vehicle's telemetry streams.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFeed {
    /// Ordered by camera index.
    #[serde(default)]
    pub camera_feeds_image_folders: Vec<String>,
    pub geolocation_folder: String,
}

/// Folder assigned to one input or output channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelFolder {
    pub id: ChannelId,
    pub folder: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRequest {
    /// Only the first feed is used.
    #[serde(default)]
    pub telemetry_feeds: Vec<TelemetryFeed>,
    #[serde(default)]
    pub input_channels: Vec<ChannelFolder>,
    #[serde(default)]
    pub output_channels: Vec<ChannelFolder>,
    /// Optional runtime tuning; command-line flags take precedence.
    #[serde(default)]
    pub runtime: Option<RuntimeConfig>,
}

impl PluginRequest {
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        let text = fs::read_to_string(path).map_err(|source| PluginError::ReadRequest {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| PluginError::ParseRequest {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn primary_feed(&self) -> Result<&TelemetryFeed, PluginError> {
        self.telemetry_feeds
            .first()
            .ok_or(PluginError::MissingTelemetryFeed)
    }

    /// First camera folder of the primary feed.
    pub fn primary_camera_folder(&self) -> Result<&str, PluginError> {
        self.primary_feed()?
            .camera_feeds_image_folders
            .first()
            .map(String::as_str)
            .ok_or(PluginError::MissingCameraFolder)
    }

    pub fn input_channel_folder(&self, id: ChannelId) -> Result<&str, PluginError> {
        lookup(&self.input_channels, id, Direction::Inbound)
    }

    pub fn output_channel_folder(&self, id: ChannelId) -> Result<&str, PluginError> {
        lookup(&self.output_channels, id, Direction::Outbound)
    }
}

fn lookup(folders: &[ChannelFolder], id: ChannelId, direction: Direction) -> Result<&str, PluginError> {
    folders
        .iter()
        .find(|c| c.id == id)
        .map(|c| c.folder.as_str())
        .ok_or(PluginError::UnknownChannel { id, direction })
}
