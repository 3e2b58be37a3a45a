//! Map configuration and the view the dashboard draws from it.

use serde::Serialize;
use tacmap_protocol::{Coordinate, MapObject, MapObjectType};

use crate::render::{render_marker, renderer_for};

/// Warsaw.
pub const DEFAULT_CENTER: Coordinate = Coordinate::new(52.2297, 21.0122);
pub const DEFAULT_ZOOM: u8 = 10;

const OSM_TILES: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
const OSM_ATTRIBUTION: &str = "&copy; OpenStreetMap contributors";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileProvider {
    OpenStreetMap,
    /// Template with `{z}/{x}/{y}` and a `{key}` placeholder.
    Keyed {
        url_template: String,
        api_key: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MapStatus {
    Ready,
    Degraded { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    /// Fixed center; when unset the view centers on the objects.
    pub center: Option<Coordinate>,
    pub zoom: u8,
    pub provider: TileProvider,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: None,
            zoom: DEFAULT_ZOOM,
            provider: TileProvider::OpenStreetMap,
        }
    }
}

impl MapConfig {
    pub fn status(&self) -> MapStatus {
        match &self.provider {
            TileProvider::OpenStreetMap => MapStatus::Ready,
            TileProvider::Keyed { api_key, .. } => match api_key.as_deref().map(str::trim) {
                Some(key) if !key.is_empty() => MapStatus::Ready,
                _ => MapStatus::Degraded {
                    reason: "Map tiles unavailable: no map API key configured.".to_string(),
                },
            },
        }
    }

    /// Tile URL template for the client, or `None` when tiles cannot load.
    pub fn tile_url(&self) -> Option<String> {
        match &self.provider {
            TileProvider::OpenStreetMap => Some(OSM_TILES.to_string()),
            TileProvider::Keyed {
                url_template,
                api_key,
            } => {
                let key = api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
                Some(url_template.replace("{key}", key))
            }
        }
    }

    fn attribution(&self) -> &'static str {
        match self.provider {
            TileProvider::OpenStreetMap => OSM_ATTRIBUTION,
            TileProvider::Keyed { .. } => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerView {
    pub id: String,
    pub object_type: MapObjectType,
    pub latitude: f64,
    pub longitude: f64,
    pub title: String,
    pub class: &'static str,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub center: Coordinate,
    pub zoom: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_url: Option<String>,
    pub attribution: &'static str,
    pub status: MapStatus,
    pub markers: Vec<MarkerView>,
}

impl MapView {
    pub fn build(config: &MapConfig, objects: &[MapObject]) -> Self {
        let markers: Vec<MarkerView> = objects.iter().filter_map(marker_for).collect();
        let center = config
            .center
            .or_else(|| mean_center(&markers))
            .unwrap_or(DEFAULT_CENTER);

        Self {
            center,
            zoom: config.zoom,
            tile_url: config.tile_url(),
            attribution: config.attribution(),
            status: config.status(),
            markers,
        }
    }
}

fn marker_for(object: &MapObject) -> Option<MarkerView> {
    let at = object.coordinate()?;
    let object_type = object.object_type();
    let summary = object.summary();
    Some(MarkerView {
        id: object.id().to_string(),
        object_type,
        latitude: at.latitude,
        longitude: at.longitude,
        class: renderer_for(object_type.as_str()).class,
        html: render_marker(object_type.as_str(), &summary),
        title: summary,
    })
}

fn mean_center(markers: &[MarkerView]) -> Option<Coordinate> {
    if markers.is_empty() {
        return None;
    }
    let n = markers.len() as f64;
    let (lat, lng) = markers
        .iter()
        .fold((0.0, 0.0), |(lat, lng), m| (lat + m.latitude, lng + m.longitude));
    Some(Coordinate::new(lat / n, lng / n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tacmap_protocol::records::{EnemyFields, LocationFields};
    use tacmap_protocol::Record;

    fn record<F>(id: &str, fields: F) -> Record<F> {
        Record {
            id: id.to_string(),
            created_at_ms: 0,
            updated_at_ms: 0,
            rev: 1,
            fields,
        }
    }

    #[test]
    fn keyed_provider_without_key_degrades() {
        let config = MapConfig {
            provider: TileProvider::Keyed {
                url_template: "https://tiles.example/{z}/{x}/{y}.png?key={key}".to_string(),
                api_key: Some("  ".to_string()),
            },
            ..MapConfig::default()
        };
        assert!(matches!(config.status(), MapStatus::Degraded { .. }));
        assert_eq!(config.tile_url(), None);

        let config = MapConfig {
            provider: TileProvider::Keyed {
                url_template: "https://tiles.example/{z}/{x}/{y}.png?key={key}".to_string(),
                api_key: Some("abc".to_string()),
            },
            ..MapConfig::default()
        };
        assert_eq!(config.status(), MapStatus::Ready);
        assert_eq!(
            config.tile_url().as_deref(),
            Some("https://tiles.example/{z}/{x}/{y}.png?key=abc")
        );
    }

    #[test]
    fn center_falls_back_from_config_to_objects_to_default() {
        let empty = MapView::build(&MapConfig::default(), &[]);
        assert_eq!(empty.center, DEFAULT_CENTER);
        assert_eq!(empty.zoom, DEFAULT_ZOOM);

        let objects = vec![
            MapObject::Location(record(
                "loc-1",
                LocationFields {
                    latitude: 50.0,
                    longitude: 20.0,
                    ..Default::default()
                },
            )),
            MapObject::Location(record(
                "loc-2",
                LocationFields {
                    latitude: 52.0,
                    longitude: 22.0,
                    ..Default::default()
                },
            )),
            // No coordinate: not drawn, not averaged.
            MapObject::Enemy(record("eny-1", EnemyFields::default())),
        ];
        let view = MapView::build(&MapConfig::default(), &objects);
        assert_eq!(view.markers.len(), 2);
        assert_eq!(view.center, Coordinate::new(51.0, 21.0));

        let pinned = MapConfig {
            center: Some(Coordinate::new(1.0, 2.0)),
            ..MapConfig::default()
        };
        assert_eq!(
            MapView::build(&pinned, &objects).center,
            Coordinate::new(1.0, 2.0)
        );
    }
}
