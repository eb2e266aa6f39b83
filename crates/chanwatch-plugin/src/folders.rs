/// Folder layout for one plugin run.
///
/// Three roots come from the command line (telemetry streams, input
/// channels, output channels); the request file names the folder of each
/// stream and channel under them. Rendered artifacts live under
/// `<output root>/images/{heatmap,geo_overlay,ui}`: those are the folders
/// the retention sweeper keeps bounded, never the channel folders
/// themselves.
use crate::error::PluginError;
use crate::request::PluginRequest;
use chanwatch_core::ChannelId;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Well-known channel ids shared with the host.
pub mod ids {
    use chanwatch_core::ChannelId;

    pub const OBJECT_DETECTION: ChannelId = 0;
    pub const HEATMAP: ChannelId = 1;
    pub const GEO_OVERLAY: ChannelId = 2;
    pub const UI: ChannelId = 3;
    pub const USER_FORM: ChannelId = 4;

    /// Telemetry streams are not host channels; these ids only label the
    /// watchers that consume them.
    pub const CAMERA_FEED: ChannelId = 10;
    pub const GEOLOCATION: ChannelId = 11;
}

/// Root folders passed on the command line.
#[derive(Debug, Clone)]
pub struct FolderRoots {
    pub telemetry: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Every folder the plugin reads from or writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFolders {
    pub camera_feed: PathBuf,
    pub geolocation: PathBuf,
    pub ui_input: PathBuf,
    pub user_form_input: PathBuf,
    pub object_detection_output: PathBuf,
    pub heatmap_output: PathBuf,
    pub geo_overlay_output: PathBuf,
    pub ui_output: PathBuf,
    pub heatmap_images: PathBuf,
    pub geo_overlay_images: PathBuf,
    pub ui_images: PathBuf,
}

const IMAGES_FOLDER: &str = "images";

impl PluginFolders {
    pub fn resolve(request: &PluginRequest, roots: &FolderRoots) -> Result<Self, PluginError> {
        let feed = request.primary_feed()?;
        let input = |id: ChannelId| -> Result<PathBuf, PluginError> {
            Ok(roots.input.join(request.input_channel_folder(id)?))
        };
        let output = |id: ChannelId| -> Result<PathBuf, PluginError> {
            Ok(roots.output.join(request.output_channel_folder(id)?))
        };

        let images = roots.output.join(IMAGES_FOLDER);

        Ok(Self {
            camera_feed: roots.telemetry.join(request.primary_camera_folder()?),
            geolocation: roots.telemetry.join(&feed.geolocation_folder),
            ui_input: input(ids::UI)?,
            user_form_input: input(ids::USER_FORM)?,
            object_detection_output: output(ids::OBJECT_DETECTION)?,
            heatmap_output: output(ids::HEATMAP)?,
            geo_overlay_output: output(ids::GEO_OVERLAY)?,
            ui_output: output(ids::UI)?,
            heatmap_images: images.join("heatmap"),
            geo_overlay_images: images.join("geo_overlay"),
            ui_images: images.join("ui"),
        })
    }

    /// Folders under retention.
    pub fn image_folders(&self) -> Vec<PathBuf> {
        vec![
            self.heatmap_images.clone(),
            self.geo_overlay_images.clone(),
            self.ui_images.clone(),
        ]
    }

    pub fn all(&self) -> [&Path; 11] {
        [
            self.camera_feed.as_path(),
            self.geolocation.as_path(),
            self.ui_input.as_path(),
            self.user_form_input.as_path(),
            self.object_detection_output.as_path(),
            self.heatmap_output.as_path(),
            self.geo_overlay_output.as_path(),
            self.ui_output.as_path(),
            self.heatmap_images.as_path(),
            self.geo_overlay_images.as_path(),
            self.ui_images.as_path(),
        ]
    }
}

/// Create every folder of the layout. Existing folders are left alone.
pub fn initialise_folders(folders: &PluginFolders) -> Result<(), PluginError> {
    for dir in folders.all() {
        fs::create_dir_all(dir).map_err(|source| PluginError::CreateFolder {
            path: dir.to_path_buf(),
            source,
        })?;
        debug!(dir = %dir.display(), "folder ready");
    }
    Ok(())
}
