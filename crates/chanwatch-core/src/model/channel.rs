/// A channel is one logical stream backed by a directory.
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable small integer identifying a channel within its direction.
pub type ChannelId = u8;

/// Which way messages flow through a channel, seen from the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Host writes, plugin reads.
    Inbound,
    /// Plugin writes, host reads.
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => f.write_str("inbound"),
            Direction::Outbound => f.write_str("outbound"),
        }
    }
}

/// A channel and the directory acting as its mailbox.
///
/// The directory must exist before the channel is used; creating it is the
/// job of whoever lays out the folders at startup, never the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub direction: Direction,
    /// Human-readable name used in log lines (e.g. `"ui-input"`).
    pub label: CompactString,
    pub path: PathBuf,
}

impl Channel {
    pub fn inbound(id: ChannelId, label: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            direction: Direction::Inbound,
            label: CompactString::new(label),
            path: path.into(),
        }
    }

    pub fn outbound(id: ChannelId, label: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            direction: Direction::Outbound,
            label: CompactString::new(label),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` when the mailbox directory currently exists.
    pub fn is_available(&self) -> bool {
        self.path.is_dir()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} channel {} ({})", self.direction, self.id, self.label)
    }
}
