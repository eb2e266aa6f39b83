/// Messages: single files inside a channel directory.
use crate::model::ChannelId;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One directory entry as seen by a single scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileObservation {
    pub path: PathBuf,
    pub size: u64,
    /// `None` when the platform cannot report a modification time.
    pub modified: Option<SystemTime>,
}

impl FileObservation {
    pub fn identity(&self) -> FileIdentity {
        FileIdentity {
            path: self.path.clone(),
            modified: self.modified,
        }
    }
}

/// What makes two observations "the same file" for at-most-once dispatch.
///
/// A file rewritten in place with a new modification time is a new message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

/// A ready, immutable inbound message handed to a handler.
#[derive(Debug, Clone)]
pub struct Message {
    pub channel: ChannelId,
    pub path: PathBuf,
    pub size: u64,
    /// Best-effort arrival time taken from the file's modification time.
    pub arrival_time: DateTime<Local>,
}

impl Message {
    pub(crate) fn from_observation(channel: ChannelId, observation: FileObservation) -> Self {
        let arrival_time = observation
            .modified
            .map(DateTime::<Local>::from)
            .unwrap_or_else(Local::now);
        Self {
            channel,
            path: observation.path,
            size: observation.size,
            arrival_time,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name as a lossy UTF-8 string, empty if the path has none.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
