mod object;
pub mod records;

pub use object::{
    Collection, Coordinate, MapObject, MapObjectBuilder, MapObjectType, UnknownTag,
};
pub use records::{Record, Removed, Summary};

use serde::{Deserialize, Serialize};

/// One DOM update for the dashboard: `html` replaces the contents of the
/// element whose id is `target`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl Patch {
    pub fn replace(target: &str, html: impl Into<String>) -> Self {
        Self {
            target: target.to_string(),
            html: Some(html.into()),
            payload: None,
            trigger: None,
        }
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiUpdate {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub patches: Vec<Patch>,
}

impl UiUpdate {
    pub fn new(event: impl Into<String>, patches: Vec<Patch>) -> Self {
        Self {
            event: event.into(),
            payload: None,
            patches,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

pub mod targets {
    pub const PANEL_MENU: &str = "panel.menu";
    pub const PANEL_LIST: &str = "panel.list";
    pub const PANEL_ADD: &str = "panel.add";
    pub const MAP_BANNER: &str = "map.banner";
    pub const MAP_HINT: &str = "map.hint";

    /// Client-side trigger telling the dashboard to refetch `/api/objects`.
    pub const TRIGGER_MARKERS: &str = "markers.refresh";
}

/// Status line shown above the contextual menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Success,
    Error,
}

impl StatusMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == StatusKind::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SoldierFields;

    #[test]
    fn map_object_wire_shape_is_tagged() {
        let obj = MapObject::Soldier(Record {
            id: "sol-1".to_string(),
            created_at_ms: 1,
            updated_at_ms: 1,
            rev: 1,
            fields: SoldierFields {
                first_name: "John".to_string(),
                last_name: "Doe".to_string(),
                rank: Some("Sergeant".to_string()),
                latitude: Some(52.2297),
                longitude: Some(21.0122),
                ..Default::default()
            },
        });
        let v = serde_json::to_value(&obj).unwrap();
        assert_eq!(v["objectType"], "soldier");
        assert_eq!(v["object"]["firstName"], "John");
        assert_eq!(v["object"]["id"], "sol-1");
        assert!(v["object"].get("unitId").is_none());

        let back: MapObject = serde_json::from_value(v).unwrap();
        assert_eq!(back, obj);
        assert_eq!(back.summary(), "John Doe — Sergeant");
    }

    #[test]
    fn object_type_tags_parse_and_map_to_collections() {
        for t in MapObjectType::ALL {
            assert_eq!(t.as_str().parse::<MapObjectType>().unwrap(), t);
            assert_eq!(t.collection().object_type(), Some(t));
        }
        assert!("tank".parse::<MapObjectType>().is_err());
        assert_eq!(Collection::Armaments.object_type(), None);
        assert_eq!("deliveries".parse::<Collection>().unwrap(), Collection::Deliveries);
    }

    #[test]
    fn coordinate_label_uses_four_decimals() {
        assert_eq!(Coordinate::new(52.2297, 21.0122).label(), "52.2297°, 21.0122°");
    }

    #[test]
    fn patch_wire_shape_is_target_and_html() {
        let patch = Patch::replace(targets::PANEL_MENU, "<p>x</p>")
            .with_trigger(targets::TRIGGER_MARKERS);
        let v = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "target": targets::PANEL_MENU,
                "html": "<p>x</p>",
                "trigger": targets::TRIGGER_MARKERS,
            })
        );
    }
}
