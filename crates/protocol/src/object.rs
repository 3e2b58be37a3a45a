use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::records::{
    Base, Delivery, Enemy, Location, Mission, Soldier, Unit, Vehicle,
};

/// Entity types that can be placed on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapObjectType {
    Soldier,
    Unit,
    Vehicle,
    Location,
    Base,
    Mission,
    Delivery,
    Enemy,
}

impl MapObjectType {
    pub const ALL: [Self; 8] = [
        Self::Soldier,
        Self::Unit,
        Self::Vehicle,
        Self::Location,
        Self::Base,
        Self::Mission,
        Self::Delivery,
        Self::Enemy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Soldier => "soldier",
            Self::Unit => "unit",
            Self::Vehicle => "vehicle",
            Self::Location => "location",
            Self::Base => "base",
            Self::Mission => "mission",
            Self::Delivery => "delivery",
            Self::Enemy => "enemy",
        }
    }

    /// Capitalized form used in hints and status messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Soldier => "Soldier",
            Self::Unit => "Unit",
            Self::Vehicle => "Vehicle",
            Self::Location => "Location",
            Self::Base => "Base",
            Self::Mission => "Mission",
            Self::Delivery => "Delivery",
            Self::Enemy => "Enemy",
        }
    }

    pub fn collection(self) -> Collection {
        match self {
            Self::Soldier => Collection::Soldiers,
            Self::Unit => Collection::Units,
            Self::Vehicle => Collection::Vehicles,
            Self::Location => Collection::Locations,
            Self::Base => Collection::Bases,
            Self::Mission => Collection::Missions,
            Self::Delivery => Collection::Deliveries,
            Self::Enemy => Collection::Enemies,
        }
    }
}

impl fmt::Display for MapObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapObjectType {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTag(s.to_string()))
    }
}

/// Store collections, including the supporting ones that never appear on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Soldiers,
    Units,
    Vehicles,
    Bases,
    Missions,
    Deliveries,
    Enemies,
    Locations,
    Armaments,
    Events,
}

impl Collection {
    pub const ALL: [Self; 10] = [
        Self::Soldiers,
        Self::Units,
        Self::Vehicles,
        Self::Bases,
        Self::Missions,
        Self::Deliveries,
        Self::Enemies,
        Self::Locations,
        Self::Armaments,
        Self::Events,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Soldiers => "soldiers",
            Self::Units => "units",
            Self::Vehicles => "vehicles",
            Self::Bases => "bases",
            Self::Missions => "missions",
            Self::Deliveries => "deliveries",
            Self::Enemies => "enemies",
            Self::Locations => "locations",
            Self::Armaments => "armaments",
            Self::Events => "events",
        }
    }

    /// Singular noun used in "X not found" messages.
    pub fn singular(self) -> &'static str {
        match self {
            Self::Soldiers => "Soldier",
            Self::Units => "Unit",
            Self::Vehicles => "Vehicle",
            Self::Bases => "Base",
            Self::Missions => "Mission",
            Self::Deliveries => "Delivery",
            Self::Enemies => "Enemy",
            Self::Locations => "Location",
            Self::Armaments => "Armament",
            Self::Events => "Event",
        }
    }

    /// Short prefix for generated record ids.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Soldiers => "sol",
            Self::Units => "unt",
            Self::Vehicles => "veh",
            Self::Bases => "bas",
            Self::Missions => "msn",
            Self::Deliveries => "dlv",
            Self::Enemies => "eny",
            Self::Locations => "loc",
            Self::Armaments => "arm",
            Self::Events => "evt",
        }
    }

    pub fn object_type(self) -> Option<MapObjectType> {
        MapObjectType::ALL
            .into_iter()
            .find(|t| t.collection() == self)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownTag(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTag(pub String);

impl fmt::Display for UnknownTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tag: {}", self.0)
    }
}

impl std::error::Error for UnknownTag {}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// `52.2297°, 21.0122°`
    pub fn label(&self) -> String {
        format!("{:.4}°, {:.4}°", self.latitude, self.longitude)
    }
}

/// An unpersisted placement intent. It never carries an id; once the store
/// accepts the write the result is a [`MapObject`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapObjectBuilder {
    pub object_type: MapObjectType,
    pub latitude: f64,
    pub longitude: f64,
}

impl MapObjectBuilder {
    pub fn new(object_type: MapObjectType, at: Coordinate) -> Self {
        Self {
            object_type,
            latitude: at.latitude,
            longitude: at.longitude,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A persisted entity tagged with its type. Serialized as
/// `{"objectType": "...", "object": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "objectType", content = "object", rename_all = "lowercase")]
pub enum MapObject {
    Soldier(Soldier),
    Unit(Unit),
    Vehicle(Vehicle),
    Location(Location),
    Base(Base),
    Mission(Mission),
    Delivery(Delivery),
    Enemy(Enemy),
}

impl MapObject {
    pub fn object_type(&self) -> MapObjectType {
        match self {
            Self::Soldier(_) => MapObjectType::Soldier,
            Self::Unit(_) => MapObjectType::Unit,
            Self::Vehicle(_) => MapObjectType::Vehicle,
            Self::Location(_) => MapObjectType::Location,
            Self::Base(_) => MapObjectType::Base,
            Self::Mission(_) => MapObjectType::Mission,
            Self::Delivery(_) => MapObjectType::Delivery,
            Self::Enemy(_) => MapObjectType::Enemy,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Soldier(r) => &r.id,
            Self::Unit(r) => &r.id,
            Self::Vehicle(r) => &r.id,
            Self::Location(r) => &r.id,
            Self::Base(r) => &r.id,
            Self::Mission(r) => &r.id,
            Self::Delivery(r) => &r.id,
            Self::Enemy(r) => &r.id,
        }
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Self::Soldier(r) => coordinate_of(r.fields.latitude, r.fields.longitude),
            Self::Unit(r) => coordinate_of(r.fields.latitude, r.fields.longitude),
            Self::Vehicle(r) => coordinate_of(r.fields.latitude, r.fields.longitude),
            Self::Location(r) => Some(Coordinate::new(r.fields.latitude, r.fields.longitude)),
            Self::Base(r) => coordinate_of(r.fields.latitude, r.fields.longitude),
            Self::Mission(r) => coordinate_of(r.fields.latitude, r.fields.longitude),
            Self::Delivery(r) => coordinate_of(r.fields.latitude, r.fields.longitude),
            Self::Enemy(r) => coordinate_of(r.fields.latitude, r.fields.longitude),
        }
    }

    pub fn summary(&self) -> String {
        use crate::records::Summary;
        match self {
            Self::Soldier(r) => r.fields.summary(),
            Self::Unit(r) => r.fields.summary(),
            Self::Vehicle(r) => r.fields.summary(),
            Self::Location(r) => r.fields.summary(),
            Self::Base(r) => r.fields.summary(),
            Self::Mission(r) => r.fields.summary(),
            Self::Delivery(r) => r.fields.summary(),
            Self::Enemy(r) => r.fields.summary(),
        }
    }
}

fn coordinate_of(latitude: Option<f64>, longitude: Option<f64>) -> Option<Coordinate> {
    match (latitude, longitude) {
        (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
        _ => None,
    }
}
