/// Outbound writing: per-handler sequence numbers and atomic file commits.
///
/// Outputs are staged under a hidden temporary name and renamed into place
/// on commit, so the host never reads a half-written message. A handler
/// that fails part-way drops its batch and nothing becomes visible.
use crate::error::ChannelError;
use crate::model::{Channel, Direction};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Monotonic output counter owned by one handler instance.
///
/// `peek` gives the number the next output will carry; only `commit`
/// advances it, so failed attempts never leave gaps.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Sequence {
    next: u64,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    /// Number reserved for the output currently being produced.
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Mark the current number as used; returns it.
    pub fn commit(&mut self) -> u64 {
        let used = self.next;
        self.next += 1;
        used
    }
}

/// An outbound channel a handler writes into.
#[derive(Debug, Clone)]
pub struct OutputChannel {
    channel: Channel,
}

impl OutputChannel {
    pub fn new(channel: Channel) -> Self {
        debug_assert_eq!(channel.direction, Direction::Outbound);
        Self { channel }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn dir(&self) -> &Path {
        self.channel.path()
    }

    /// Path of `<stem>.<extension>` inside the channel directory.
    pub fn file_path(&self, stem: impl std::fmt::Display, extension: &str) -> PathBuf {
        self.channel.path().join(format!("{stem}.{extension}"))
    }

    /// Serialise `value` as `<sequence>.json` and commit it immediately.
    pub fn write_json<T: Serialize>(&self, sequence: u64, value: &T) -> Result<PathBuf, ChannelError> {
        let target = self.file_path(sequence, "json");
        let mut batch = OutputBatch::new();
        batch.stage_json(&target, value)?;
        batch.commit()?;
        Ok(target)
    }
}

/// A group of outputs that become visible together or not at all.
#[derive(Debug, Default)]
pub struct OutputBatch {
    /// (temporary path, final path)
    staged: Vec<(PathBuf, PathBuf)>,
}

impl OutputBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Write `bytes` to a hidden temporary next to `target`.
    pub fn stage_bytes(&mut self, target: &Path, bytes: &[u8]) -> Result<(), ChannelError> {
        let temp = temp_path(target);
        fs::write(&temp, bytes).map_err(|e| ChannelError::io(&temp, e))?;
        self.staged.push((temp, target.to_path_buf()));
        Ok(())
    }

    /// Serialise `value` as pretty JSON and stage it for `target`.
    pub fn stage_json<T: Serialize>(&mut self, target: &Path, value: &T) -> Result<(), ChannelError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| ChannelError::Encode {
            path: target.to_path_buf(),
            source,
        })?;
        self.stage_bytes(target, &bytes)
    }

    /// Copy an existing file into the batch (e.g. a derived artifact).
    pub fn stage_copy(&mut self, source: &Path, target: &Path) -> Result<(), ChannelError> {
        let temp = temp_path(target);
        fs::copy(source, &temp).map_err(|e| ChannelError::io(source, e))?;
        self.staged.push((temp, target.to_path_buf()));
        Ok(())
    }

    /// Rename every staged file into place, in staging order.
    ///
    /// If a rename fails, targets already renamed are moved back to their
    /// temporaries and discarded with the rest of the batch: the caller
    /// sees an error and no output of this batch stays visible.
    pub fn commit(mut self) -> Result<Vec<PathBuf>, ChannelError> {
        let staged = std::mem::take(&mut self.staged);
        let mut committed: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(staged.len());
        let mut pending = staged.into_iter();
        while let Some((temp, target)) = pending.next() {
            if let Err(e) = fs::rename(&temp, &target) {
                let err = ChannelError::io(&target, e);
                self.roll_back(committed);
                // Drop removes the failed temporary and everything unrenamed.
                self.staged.push((temp, target));
                self.staged.extend(pending);
                return Err(err);
            }
            committed.push((temp, target));
        }
        Ok(committed
            .into_iter()
            .map(|(_, target)| {
                debug!(path = %target.display(), "output committed");
                target
            })
            .collect())
    }

    /// Take back renames already performed, newest first.
    fn roll_back(&mut self, committed: Vec<(PathBuf, PathBuf)>) {
        for (temp, target) in committed.into_iter().rev() {
            match fs::rename(&target, &temp) {
                Ok(()) => self.staged.push((temp, target)),
                Err(e) => {
                    warn!(path = %target.display(), error = %e, "rollback rename failed; removing output");
                    if let Err(e) = fs::remove_file(&target) {
                        warn!(path = %target.display(), error = %e, "partial output left behind");
                    }
                }
            }
        }
    }
}

impl Drop for OutputBatch {
    fn drop(&mut self) {
        for (temp, _) in self.staged.drain(..) {
            if let Err(e) = fs::remove_file(&temp) {
                warn!(path = %temp.display(), error = %e, "failed to discard staged output");
            }
        }
    }
}

fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.partial"))
}
