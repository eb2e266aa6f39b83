/// Runtime tuning and startup validation.
///
/// All checks here run before any thread is spawned, so a bad layout
/// fails the process with a non-zero exit code instead of half-starting.
use crate::error::ConfigError;
use crate::model::{Channel, ChannelId, Direction};
use crate::watcher::ObserverKind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

/// Default number of most-recent files kept in each swept directory.
pub const DEFAULT_RETENTION_CAPACITY: usize = 10;

/// Timing and retention knobs for one runtime instance.
///
/// Serialised with millisecond fields so it can be embedded in a request
/// file; missing fields fall back to [`RuntimeConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Delay between two scans of an inbound directory.
    pub poll_interval_ms: u64,
    /// How long a file's size must stay unchanged before it is dispatched.
    pub quiescence_ms: u64,
    /// Files kept per swept directory.
    pub retention_capacity: usize,
    /// Delay between two retention sweeps.
    pub sweep_interval_ms: u64,
    /// Delay between two checks for the stop sentinel.
    pub sentinel_poll_ms: u64,
    /// How inbound directories are observed.
    pub observer: ObserverKind,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            quiescence_ms: 200,
            retention_capacity: DEFAULT_RETENTION_CAPACITY,
            sweep_interval_ms: 1_000,
            sentinel_poll_ms: 200,
            observer: ObserverKind::Poll,
        }
    }
}

impl RuntimeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn sentinel_poll(&self) -> Duration {
        Duration::from_millis(self.sentinel_poll_ms)
    }

    /// Reject values that would make the runtime spin or never dispatch.
    ///
    /// The quiescence interval may not be shorter than one poll cycle: a
    /// file is only ready after two observations at least that far apart.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        for (name, value) in [
            ("poll interval", self.poll_interval_ms),
            ("sweep interval", self.sweep_interval_ms),
            ("sentinel poll interval", self.sentinel_poll_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval { name });
            }
        }
        if self.quiescence_ms < self.poll_interval_ms {
            return Err(ConfigError::QuiescenceTooShort {
                quiescence: self.quiescence(),
                poll: self.poll_interval(),
            });
        }
        Ok(())
    }
}

/// Check a set of channels about to be watched.
///
/// Every channel must be inbound, have a unique id, own its directory
/// exclusively, and that directory must already exist.
pub fn validate_watched_channels<'a, I>(channels: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = &'a Channel>,
{
    let mut ids: HashSet<ChannelId> = HashSet::new();
    let mut owners: HashMap<PathBuf, ChannelId> = HashMap::new();
    let mut any = false;

    for channel in channels {
        any = true;
        if channel.direction != Direction::Inbound {
            return Err(ConfigError::NotInbound {
                id: channel.id,
                actual: channel.direction,
            });
        }
        if !ids.insert(channel.id) {
            return Err(ConfigError::DuplicateId {
                id: channel.id,
                direction: channel.direction,
            });
        }
        check_directory(channel)?;

        // Compare canonical paths so `a/./b` and `a/b` count as one owner.
        let key = channel
            .path
            .canonicalize()
            .unwrap_or_else(|_| channel.path.clone());
        if let Some(first) = owners.insert(key, channel.id) {
            return Err(ConfigError::SharedDirectory {
                first,
                second: channel.id,
                path: channel.path.clone(),
            });
        }
    }

    if !any {
        return Err(ConfigError::NoInboundChannels);
    }
    Ok(())
}

/// Check that every retention directory exists.
pub fn validate_retention_dirs(dirs: &[PathBuf]) -> Result<(), ConfigError> {
    match dirs.iter().find(|d| !d.is_dir()) {
        Some(missing) => Err(ConfigError::MissingRetentionDirectory {
            path: missing.clone(),
        }),
        None => Ok(()),
    }
}

fn check_directory(channel: &Channel) -> Result<(), ConfigError> {
    if !channel.path.exists() {
        return Err(ConfigError::MissingDirectory {
            id: channel.id,
            path: channel.path.clone(),
        });
    }
    if !channel.path.is_dir() {
        return Err(ConfigError::NotADirectory {
            id: channel.id,
            path: channel.path.clone(),
        });
    }
    Ok(())
}
