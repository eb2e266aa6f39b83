/// Output payloads, serialised as the host expects them.
///
/// Images are not rendered here. Where the host expects a picture, the
/// descriptor points at either a copy of the source frame or a [`Sketch`]:
/// a small JSON description of the text and panels to draw.
use serde::{Deserialize, Serialize};

/// Heading sizes understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LabelType {
    H1,
    H2,
    H3,
}

/// Host palette index, e.g. `"C15"`.
pub fn colour_index(n: u8) -> String {
    format!("C{n}")
}

/// One labelled, clickable bounding box on a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
    /// Detection confidence the host may filter on.
    pub filter_value: f64,
    pub name: String,
    pub label_type: LabelType,
    pub outline_colour_index: String,
    /// Reported back by the host when the box is clicked.
    pub clickable: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualDescriptor {
    pub desc: String,
    pub ref_width: u32,
    pub ref_height: u32,
    pub boxes: Vec<VoBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapInfo {
    pub scaling_factor: f64,
    pub scaling_unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapDescriptor {
    pub desc: String,
    pub heatmap_info: HeatmapInfo,
    pub image_url: String,
}

/// A rectangle the host reports clicks on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
    pub clickable: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickMap {
    pub click_boxes: Vec<ClickBox>,
    /// Always empty; the sample UI only uses rectangles.
    pub click_polygons: Vec<serde_json::Value>,
}

/// A transparent overlay, optionally clickable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlphaBitmapDescriptor {
    pub desc: String,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_map: Option<ClickMap>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SketchText {
    pub x: i32,
    pub y: i32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SketchPanel {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

/// What an overlay image would contain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sketch {
    pub width: u32,
    pub height: u32,
    pub panels: Vec<SketchPanel>,
    pub texts: Vec<SketchText>,
}

// ── Inbound payloads ─────────────────────────────────────────────────────────

/// A geolocation telemetry record. Every part is optional; records without
/// a full position are skipped by the handler.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeoLocationStream {
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Position {
    pub geolocation: Option<GeoPoint>,
    pub angular: Option<Angular>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Angular {
    #[serde(default)]
    pub roll: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub yaw: f64,
}

/// A click reported by the host on the UI channel. The host echoes the
/// `clickable` of the pressed button, so this is also what buttons carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiInput {
    pub action: UiAction,
    pub state: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiAction {
    Increment,
    Decrement,
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn visual_descriptor_uses_host_field_names() {
        let descriptor = VisualDescriptor {
            desc: "object detection".into(),
            ref_width: 1920,
            ref_height: 1080,
            boxes: vec![VoBox {
                xmin: 1,
                ymin: 2,
                xmax: 3,
                ymax: 4,
                filter_value: 0.8,
                name: "person 1".into(),
                label_type: LabelType::H1,
                outline_colour_index: colour_index(15),
                clickable: "clicked person 1".into(),
            }],
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["refWidth"], json!(1920));
        assert_eq!(value["boxes"][0]["labelType"], json!("H1"));
        assert_eq!(value["boxes"][0]["filterValue"], json!(0.8));
        assert_eq!(value["boxes"][0]["name"], json!("person 1"));
        assert_eq!(value["boxes"][0]["clickable"], json!("clicked person 1"));
        assert_eq!(value["boxes"][0]["outlineColourIndex"], json!("C15"));
    }

    #[test]
    fn click_map_is_omitted_when_absent() {
        let descriptor = AlphaBitmapDescriptor {
            desc: "overlay".into(),
            image_url: "a.json".into(),
            click_map: None,
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert!(value.get("clickMap").is_none());
        assert_eq!(value["imageUrl"], json!("a.json"));
    }

    #[test]
    fn geolocation_without_position_parses() {
        let record: GeoLocationStream = serde_json::from_str(r#"{ "time": 12 }"#).unwrap();
        assert!(record.position.is_none());
    }

    #[test]
    fn unknown_ui_action_is_tolerated() {
        let input: UiInput = serde_json::from_str(r#"{ "action": "reset", "state": 4 }"#).unwrap();
        assert_eq!(input.action, UiAction::Unknown);
        assert_eq!(input.state, 4);
    }

    #[test]
    fn ui_input_serialises_as_the_host_echoes_it() {
        let input = UiInput {
            action: UiAction::Decrement,
            state: 7,
        };
        let text = serde_json::to_string(&input).unwrap();
        assert_eq!(text, r#"{"action":"decrement","state":7}"#);
        assert_eq!(serde_json::from_str::<UiInput>(&text).unwrap(), input);
    }
}
