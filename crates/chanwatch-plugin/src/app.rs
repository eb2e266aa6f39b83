/// Plugin wiring: request file + folder roots -> a running dispatcher.
use crate::error::PluginError;
use crate::folders::{ids, initialise_folders, FolderRoots, PluginFolders};
use crate::handlers::{publish_initial_ui, GeolocationHandler, ImageHandler, UiHandler};
use crate::request::PluginRequest;
use chanwatch_core::handler::OutputChannel;
use chanwatch_core::watcher::ObserverKind;
use chanwatch_core::{Channel, ChannelDispatcher, ChannelSpec, RunReport, RuntimeConfig, ShutdownSignal};
use std::path::PathBuf;
use tracing::info;

/// Runtime settings given on the command line. Each one, when present,
/// overrides both the request file and the defaults.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub poll_interval_ms: Option<u64>,
    pub quiescence_ms: Option<u64>,
    pub retention_capacity: Option<usize>,
    pub observer: Option<ObserverKind>,
}

impl RuntimeOverrides {
    pub fn apply(&self, mut config: RuntimeConfig) -> RuntimeConfig {
        if let Some(poll) = self.poll_interval_ms {
            config.poll_interval_ms = poll;
            // Quiescence follows the poll interval unless set explicitly.
            if self.quiescence_ms.is_none() && config.quiescence_ms < poll {
                config.quiescence_ms = poll;
            }
        }
        if let Some(quiescence) = self.quiescence_ms {
            config.quiescence_ms = quiescence;
        }
        if let Some(capacity) = self.retention_capacity {
            config.retention_capacity = capacity;
        }
        if let Some(observer) = self.observer {
            config.observer = observer;
        }
        config
    }
}

#[derive(Debug, Clone)]
pub struct PluginOptions {
    pub request_file: PathBuf,
    pub stop_file: PathBuf,
    pub roots: FolderRoots,
    pub overrides: RuntimeOverrides,
}

/// A dispatcher ready to run, with its channels and layout.
pub struct PreparedPlugin {
    pub dispatcher: ChannelDispatcher,
    pub channels: Vec<ChannelSpec>,
    pub folders: PluginFolders,
}

impl PreparedPlugin {
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.dispatcher.shutdown_signal()
    }

    /// Publish the initial UI, then watch until the stop file appears.
    pub fn run(self) -> Result<RunReport, PluginError> {
        let PreparedPlugin {
            dispatcher,
            channels,
            folders,
        } = self;
        let ui_output = OutputChannel::new(Channel::outbound(ids::UI, "ui", &folders.ui_output));
        let report = dispatcher.run(channels, || publish_initial_ui(&ui_output, &folders.ui_images))?;
        Ok(report)
    }
}

/// Load the request, create the folders and bind every handler.
pub fn prepare(options: &PluginOptions) -> Result<PreparedPlugin, PluginError> {
    let request = PluginRequest::load(&options.request_file)?;
    let folders = PluginFolders::resolve(&request, &options.roots)?;
    initialise_folders(&folders)?;

    let config = options
        .overrides
        .apply(request.runtime.clone().unwrap_or_default());
    info!(
        poll_ms = config.poll_interval_ms,
        quiescence_ms = config.quiescence_ms,
        capacity = config.retention_capacity,
        observer = %config.observer,
        "runtime configured"
    );

    let output = |id, label: &str, dir: &PathBuf| OutputChannel::new(Channel::outbound(id, label, dir));

    let channels = vec![
        ChannelSpec::new(
            Channel::inbound(ids::CAMERA_FEED, "camera", &folders.camera_feed),
            ImageHandler::new(
                output(ids::OBJECT_DETECTION, "detections", &folders.object_detection_output),
                output(ids::HEATMAP, "heatmap", &folders.heatmap_output),
                folders.heatmap_images.clone(),
            ),
        ),
        ChannelSpec::new(
            Channel::inbound(ids::GEOLOCATION, "geolocation", &folders.geolocation),
            GeolocationHandler::new(
                output(ids::GEO_OVERLAY, "overlay", &folders.geo_overlay_output),
                folders.geo_overlay_images.clone(),
            ),
        ),
        ChannelSpec::new(
            Channel::inbound(ids::UI, "ui", &folders.ui_input),
            UiHandler::new(
                output(ids::UI, "ui", &folders.ui_output),
                folders.ui_images.clone(),
            ),
        ),
    ];

    let dispatcher = ChannelDispatcher::new(config, options.stop_file.clone())
        .with_retention(folders.image_folders());

    Ok(PreparedPlugin {
        dispatcher,
        channels,
        folders,
    })
}

/// Prepare and run the plugin until the stop file appears.
pub fn run_plugin(options: &PluginOptions) -> Result<RunReport, PluginError> {
    prepare(options)?.run()
}
