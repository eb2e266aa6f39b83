/// Camera frames -> object detections + heatmap.
///
/// Each frame yields two descriptors sharing one sequence number `N`:
/// `<detections>/N.json` and `<heatmaps>/N.json`, plus `heatmapN.jpg` in the
/// heatmap image folder that the heatmap descriptor points at. Detection is
/// simulated: two boxes whose position drifts with `N`.
use super::url;
use crate::descriptors::{
    colour_index, HeatmapDescriptor, HeatmapInfo, LabelType, VisualDescriptor, VoBox,
};
use anyhow::{bail, Context};
use chanwatch_core::handler::{OutputBatch, OutputChannel, Sequence};
use chanwatch_core::{Handler, Message};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;

const REF_WIDTH: u32 = 1920;
const REF_HEIGHT: u32 = 1080;

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];

/// Sniff the first bytes; anything else is rejected before any output.
fn check_image(message: &Message) -> anyhow::Result<()> {
    let mut header = [0u8; 4];
    let n = File::open(message.path())
        .and_then(|mut f| f.read(&mut header))
        .with_context(|| format!("reading {}", message.path().display()))?;
    let header = &header[..n];
    if header.starts_with(JPEG_MAGIC) || header.starts_with(PNG_MAGIC) {
        Ok(())
    } else {
        bail!("{} is not a JPEG or PNG image", message.path().display())
    }
}

/// Simulated detector output for frame `sequence`.
pub fn detect_objects(sequence: u64) -> VisualDescriptor {
    let drift = (sequence * 37 % 101) as i32 - 50;
    let person = |n: u32, x: i32, y: i32| VoBox {
        xmin: x + drift,
        ymin: y,
        xmax: x + drift + 300,
        ymax: y + 300,
        filter_value: 0.8,
        name: format!("person {n}"),
        label_type: LabelType::H1,
        outline_colour_index: colour_index(15),
        clickable: format!("clicked person {n}"),
    };
    VisualDescriptor {
        desc: "object detection".into(),
        ref_width: REF_WIDTH,
        ref_height: REF_HEIGHT,
        boxes: vec![person(1, 300, 300), person(2, 900, 400)],
    }
}

#[derive(Debug)]
pub struct ImageHandler {
    detections: OutputChannel,
    heatmaps: OutputChannel,
    heatmap_images: PathBuf,
    sequence: Sequence,
}

impl ImageHandler {
    pub fn new(detections: OutputChannel, heatmaps: OutputChannel, heatmap_images: PathBuf) -> Self {
        Self {
            detections,
            heatmaps,
            heatmap_images,
            sequence: Sequence::new(),
        }
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }
}

impl Handler for ImageHandler {
    fn handle(&mut self, message: &Message) -> anyhow::Result<()> {
        check_image(message)?;

        let n = self.sequence.peek();
        let image = self.heatmap_images.join(format!("heatmap{n}.jpg"));
        let heatmap = HeatmapDescriptor {
            desc: "greyscale heatmap".into(),
            heatmap_info: HeatmapInfo {
                scaling_factor: 100.0,
                scaling_unit: "%".into(),
            },
            image_url: url(&image),
        };

        // The image goes first so a descriptor never points at nothing.
        let mut batch = OutputBatch::new();
        batch.stage_copy(message.path(), &image)?;
        batch.stage_json(&self.heatmaps.file_path(n, "json"), &heatmap)?;
        batch.stage_json(&self.detections.file_path(n, "json"), &detect_objects(n))?;
        batch.commit()?;
        self.sequence.commit();

        info!(sequence = n, frame = %message.path().display(), "frame processed");
        Ok(())
    }
}
