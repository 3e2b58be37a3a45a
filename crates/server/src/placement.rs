//! Add control + pending placement.
//!
//! At most one type is armed at a time. A map click while armed produces a
//! builder but leaves the type armed, so consecutive clicks keep stamping
//! builders of the same type until the user cancels.

use serde::Serialize;
use tacmap_protocol::{Coordinate, MapObjectBuilder, MapObjectType};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    selector_open: bool,
    pending: Option<MapObjectType>,
}

impl Placement {
    pub fn pending(&self) -> Option<MapObjectType> {
        self.pending
    }

    pub fn selector_open(&self) -> bool {
        self.selector_open
    }

    pub fn toggle_selector(&mut self) {
        self.selector_open = !self.selector_open;
    }

    /// Arms `object_type` and closes the selector. Returns whether the pending
    /// type changed.
    pub fn select_type(&mut self, object_type: MapObjectType) -> bool {
        self.selector_open = false;
        if self.pending == Some(object_type) {
            return false;
        }
        tracing::debug!(%object_type, "placement armed");
        self.pending = Some(object_type);
        true
    }

    pub fn cancel(&mut self) {
        if let Some(object_type) = self.pending.take() {
            tracing::debug!(%object_type, "placement cancelled");
        }
    }

    pub fn on_map_click(&self, at: Option<Coordinate>) -> Option<MapObjectBuilder> {
        let object_type = self.pending?;
        let at = at?;
        Some(MapObjectBuilder::new(object_type, at))
    }

    pub fn hint(&self) -> Option<String> {
        self.pending
            .map(|t| format!("Click on the map to place a {}.", t.label()))
    }
}
