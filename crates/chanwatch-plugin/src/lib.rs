/// chanwatch Plugin — the sample plugin built on the chanwatch runtime.
///
/// It reads the host's request file, lays out the channel folders, publishes
/// the initial UI state once, and binds three inbound feeds to handlers:
///
/// - camera frames -> object detections + heatmap descriptors;
/// - geolocation telemetry -> overlay descriptors;
/// - UI clicks -> updated UI descriptors (a bounded counter).
///
/// Rendering is not done here: where the host expects an image, handlers
/// emit a JSON sketch of what to draw (or a copy of the source frame).
///
/// # Modules
///
/// - [`request`] — The host's plugin request file.
/// - [`folders`] — Folder layout and startup folder creation.
/// - [`descriptors`] — Output payload shapes.
/// - [`handlers`] — Per-channel handlers and the initial UI publication.
/// - [`app`] — Wiring: request + folders + handlers -> running dispatcher.
pub mod app;
pub mod descriptors;
pub mod error;
pub mod folders;
pub mod handlers;
pub mod request;

pub use app::{prepare, run_plugin, PluginOptions, PreparedPlugin, RuntimeOverrides};
pub use error::PluginError;
pub use folders::{FolderRoots, PluginFolders};
pub use request::PluginRequest;
