/// Sample channel handlers.
///
/// Each handler owns its [`Sequence`](chanwatch_core::handler::Sequence) and
/// writes every output of one message through a single
/// [`OutputBatch`](chanwatch_core::handler::OutputBatch): either all files of
/// a message appear or none do, and a failed message consumes no number.
pub mod geolocation;
pub mod image;
pub mod ui;

pub use geolocation::GeolocationHandler;
pub use image::ImageHandler;
pub use ui::{publish_initial_ui, UiHandler};

use anyhow::Context;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Read and parse an inbound JSON message.
fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

/// How outputs refer to a file for the host.
fn url(path: &Path) -> String {
    path.display().to_string()
}
