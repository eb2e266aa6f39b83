/// UI channel: a counter with up and down buttons.
///
/// Each button's `clickable` is the JSON `{ "action": "increment" |
/// "decrement", "state": n }` for the state it was drawn with; the host
/// writes it back to the UI input channel when the button is pressed. The
/// handler answers with an overlay descriptor whose click map lists the
/// buttons still usable: up while the new state is below 9, down while it
/// is above 1.
use super::{read_json, url};
use crate::descriptors::{
    AlphaBitmapDescriptor, ClickBox, ClickMap, Sketch, SketchPanel, SketchText, UiAction, UiInput,
};
use chanwatch_core::handler::{OutputBatch, OutputChannel, Sequence};
use chanwatch_core::{Handler, Message};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const INITIAL_STATE: i64 = 5;
const MIN_STATE: i64 = 1;
const MAX_STATE: i64 = 9;

const UP_BUTTON: SketchPanel = SketchPanel {
    xmin: 1800,
    ymin: 370,
    xmax: 1900,
    ymax: 470,
};
const STATE_BOX: SketchPanel = SketchPanel {
    xmin: 1800,
    ymin: 490,
    xmax: 1900,
    ymax: 590,
};
const DOWN_BUTTON: SketchPanel = SketchPanel {
    xmin: 1800,
    ymin: 610,
    xmax: 1900,
    ymax: 710,
};

/// State after applying `action`; unknown actions leave it unchanged.
pub fn apply(action: UiAction, state: i64) -> i64 {
    match action {
        UiAction::Increment => (state + 1).min(MAX_STATE),
        UiAction::Decrement => (state - 1).max(MIN_STATE),
        UiAction::Unknown => state,
    }
}

fn click_box(panel: &SketchPanel, action: UiAction, state: i64) -> serde_json::Result<ClickBox> {
    Ok(ClickBox {
        xmin: panel.xmin,
        ymin: panel.ymin,
        xmax: panel.xmax,
        ymax: panel.ymax,
        clickable: serde_json::to_string(&UiInput { action, state })?,
    })
}

/// Buttons offered for `state`.
pub fn buttons(state: i64) -> serde_json::Result<Vec<ClickBox>> {
    let mut boxes = Vec::with_capacity(2);
    if state < MAX_STATE {
        boxes.push(click_box(&UP_BUTTON, UiAction::Increment, state)?);
    }
    if state > MIN_STATE {
        boxes.push(click_box(&DOWN_BUTTON, UiAction::Decrement, state)?);
    }
    Ok(boxes)
}

fn ui_sketch(state: i64) -> Sketch {
    let mut panels = vec![STATE_BOX];
    let mut texts = vec![SketchText {
        x: 1830,
        y: 520,
        text: state.to_string(),
    }];
    if state < MAX_STATE {
        panels.push(UP_BUTTON);
        texts.push(SketchText {
            x: 1830,
            y: 400,
            text: "▲".into(),
        });
    }
    if state > MIN_STATE {
        panels.push(DOWN_BUTTON);
        texts.push(SketchText {
            x: 1830,
            y: 640,
            text: "▼".into(),
        });
    }
    Sketch {
        width: 1920,
        height: 1080,
        panels,
        texts,
    }
}

/// Stage the sketch and descriptor for `state` under the given names.
fn stage_ui(
    batch: &mut OutputBatch,
    state: i64,
    sketch_path: &Path,
    descriptor_path: &Path,
    desc: String,
) -> anyhow::Result<()> {
    let descriptor = AlphaBitmapDescriptor {
        desc,
        image_url: url(sketch_path),
        click_map: Some(ClickMap {
            click_boxes: buttons(state)?,
            click_polygons: Vec::new(),
        }),
    };
    batch.stage_json(sketch_path, &ui_sketch(state))?;
    batch.stage_json(descriptor_path, &descriptor)?;
    Ok(())
}

/// Publish the UI in its initial state as `initial_ui.json`. Run once,
/// before any watcher starts.
pub fn publish_initial_ui(ui_output: &OutputChannel, images: &Path) -> anyhow::Result<()> {
    let mut batch = OutputBatch::new();
    stage_ui(
        &mut batch,
        INITIAL_STATE,
        &images.join("initial_ui.json"),
        &ui_output.file_path("initial_ui", "json"),
        "initial_ui".into(),
    )?;
    batch.commit()?;
    info!(dir = %ui_output.dir().display(), "initial UI published");
    Ok(())
}

#[derive(Debug)]
pub struct UiHandler {
    ui_output: OutputChannel,
    images: PathBuf,
    sequence: Sequence,
}

impl UiHandler {
    pub fn new(ui_output: OutputChannel, images: PathBuf) -> Self {
        Self {
            ui_output,
            images,
            sequence: Sequence::new(),
        }
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }
}

impl Handler for UiHandler {
    fn handle(&mut self, message: &Message) -> anyhow::Result<()> {
        let input: UiInput = read_json(message.path())?;
        if input.action == UiAction::Unknown {
            warn!(path = %message.path().display(), "unknown UI action; state unchanged");
        }
        let state = apply(input.action, input.state);

        let n = self.sequence.peek();
        let mut batch = OutputBatch::new();
        stage_ui(
            &mut batch,
            state,
            &self.images.join(format!("ui{n}.json")),
            &self.ui_output.file_path(n, "json"),
            format!("ui #{n}"),
        )?;
        batch.commit()?;
        self.sequence.commit();

        info!(sequence = n, state, "UI updated");
        Ok(())
    }
}
