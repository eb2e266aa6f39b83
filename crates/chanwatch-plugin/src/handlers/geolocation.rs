/// Geolocation telemetry -> overlay descriptor.
///
/// The overlay is a text panel with latitude, longitude, altitude and
/// heading. Its sketch goes to `<overlay images>/alphabitmapN.json`, the
/// descriptor to `<overlay channel>/N.json`. Records without a position
/// are skipped quietly: they produce no output and consume no number.
use super::{read_json, url};
use crate::descriptors::{
    AlphaBitmapDescriptor, Angular, GeoLocationStream, GeoPoint, Sketch, SketchPanel, SketchText,
};
use chanwatch_core::handler::{OutputBatch, OutputChannel, Sequence};
use chanwatch_core::{Handler, Message};
use std::path::PathBuf;
use tracing::{debug, info};

const OVERLAY_WIDTH: u32 = 1920;
const OVERLAY_HEIGHT: u32 = 1080;
const LINE_HEIGHT: i32 = 40;

/// Text lines shown on the overlay.
pub fn overlay_lines(point: &GeoPoint, angular: &Angular) -> Vec<String> {
    vec![
        format!("Lat: {}°", point.latitude),
        format!("Lon: {}°", point.longitude),
        format!("Altitude: {} m", point.altitude),
        format!("Heading: {}°", angular.yaw),
    ]
}

fn overlay_sketch(lines: Vec<String>) -> Sketch {
    let top = 50;
    let texts: Vec<SketchText> = lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| SketchText {
            x: 60,
            y: top + 10 + LINE_HEIGHT * i as i32,
            text,
        })
        .collect();
    let bottom = top + 20 + LINE_HEIGHT * texts.len() as i32;
    Sketch {
        width: OVERLAY_WIDTH,
        height: OVERLAY_HEIGHT,
        panels: vec![SketchPanel {
            xmin: 50,
            ymin: top,
            xmax: 500,
            ymax: bottom,
        }],
        texts,
    }
}

#[derive(Debug)]
pub struct GeolocationHandler {
    overlays: OutputChannel,
    images: PathBuf,
    sequence: Sequence,
}

impl GeolocationHandler {
    pub fn new(overlays: OutputChannel, images: PathBuf) -> Self {
        Self {
            overlays,
            images,
            sequence: Sequence::new(),
        }
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }
}

impl Handler for GeolocationHandler {
    fn handle(&mut self, message: &Message) -> anyhow::Result<()> {
        let record: GeoLocationStream = read_json(message.path())?;
        let Some(position) = record.position else {
            debug!(path = %message.path().display(), "no position; skipped");
            return Ok(());
        };
        let (Some(point), Some(angular)) = (position.geolocation, position.angular) else {
            debug!(path = %message.path().display(), "incomplete position; skipped");
            return Ok(());
        };

        let n = self.sequence.peek();
        let sketch_path = self.images.join(format!("alphabitmap{n}.json"));
        let descriptor = AlphaBitmapDescriptor {
            desc: format!("geolocation overlay #{n}"),
            image_url: url(&sketch_path),
            click_map: None,
        };

        let mut batch = OutputBatch::new();
        batch.stage_json(&sketch_path, &overlay_sketch(overlay_lines(&point, &angular)))?;
        batch.stage_json(&self.overlays.file_path(n, "json"), &descriptor)?;
        batch.commit()?;
        self.sequence.commit();

        info!(sequence = n, lat = point.latitude, lon = point.longitude, "overlay written");
        Ok(())
    }
}
