/// chanwatch Core — the directory-as-channel runtime.
///
/// A channel is a directory: new files in an inbound directory are messages
/// for a handler, files written into an outbound directory are messages for
/// the host. This crate contains the runtime only and carries no plugin
/// domain logic.
///
/// # Modules
///
/// - [`model`] — Channels, messages and file identities.
/// - [`watcher`] — Per-channel watcher, readiness policy and directory observers.
/// - [`shutdown`] — Process-wide shutdown state and the stop-sentinel watcher.
/// - [`retention`] — Background sweeper bounding derived-artifact directories.
/// - [`dispatcher`] — Starts and joins the whole runtime as a unit.
/// - [`handler`] — Handler contract and the sequenced output writer.
/// - [`config`] — Runtime tuning and startup validation.
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod model;
pub mod retention;
pub mod shutdown;
pub mod watcher;

pub use config::RuntimeConfig;
pub use dispatcher::{ChannelDispatcher, ChannelSpec, RunReport};
pub use error::{ChannelError, ConfigError, StartupError};
pub use handler::Handler;
pub use model::{Channel, ChannelId, Direction, Message};
pub use shutdown::{ShutdownSignal, ShutdownState};
