//! Per-collection write rules.
//!
//! A [`Document`] knows how to normalize itself (trim strings, drop blank
//! optionals), which invariants it must satisfy before it is written, which
//! other records it points at, and how a partial update is merged into it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tacmap_protocol::records::*;
use tacmap_protocol::{Collection, MapObject, MapObjectType, Record};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::StoreError;

/// An identifier field pointing at a record in another collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub collection: Collection,
    pub id: String,
    /// Subject of the "... not found" message when the target is missing.
    pub label: &'static str,
}

pub trait Document: Serialize + DeserializeOwned + Clone + Send + 'static {
    const COLLECTION: Collection;

    type Changes: Serialize + DeserializeOwned + Default + Clone + Send + 'static;

    /// Trims strings, clears blank optionals, and rejects values that break a
    /// collection invariant.
    fn validate(self) -> Result<Self, StoreError>;

    /// Merges a partial update. Absent fields stay as stored; a blank required
    /// field is rejected.
    fn apply(&mut self, changes: Self::Changes) -> Result<(), StoreError>;

    fn references(&self) -> Vec<Reference>;

    fn coordinate(&self) -> (Option<f64>, Option<f64>) {
        (None, None)
    }
}

/// Documents that can be shown on the map.
pub trait Placeable: Document {
    const OBJECT_TYPE: MapObjectType;

    fn into_map_object(record: Record<Self>) -> MapObject;
}

fn required(value: String, label: &str) -> Result<String, StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation(format!("{label} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_negative(value: Option<i64>, label: &str) -> Result<(), StoreError> {
    match value {
        Some(v) if v < 0 => Err(StoreError::validation(format!(
            "{label} must be non-negative"
        ))),
        _ => Ok(()),
    }
}

fn coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), StoreError> {
    match (latitude, longitude) {
        (None, None) => Ok(()),
        (Some(lat), Some(lng)) => {
            if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                return Err(StoreError::validation("Latitude must be between -90 and 90"));
            }
            if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
                return Err(StoreError::validation(
                    "Longitude must be between -180 and 180",
                ));
            }
            Ok(())
        }
        _ => Err(StoreError::validation(
            "Latitude and longitude must be provided together",
        )),
    }
}

/// Accepts `2024-05-01`, `2024-05-01T10:00` and RFC 3339 timestamps.
fn iso_date(value: &str, label: &str) -> Result<(), StoreError> {
    let ok = OffsetDateTime::parse(value, &Rfc3339).is_ok()
        || PrimitiveDateTime::parse(value, &Iso8601::PARSING).is_ok()
        || Date::parse(value, &Iso8601::PARSING).is_ok();
    if ok {
        Ok(())
    } else {
        Err(StoreError::validation(format!(
            "{label} must be an ISO 8601 date"
        )))
    }
}

fn change_required(
    target: &mut String,
    change: Option<String>,
    label: &str,
) -> Result<(), StoreError> {
    if let Some(value) = change {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(StoreError::validation(format!("{label} cannot be empty")));
        }
        *target = trimmed.to_string();
    }
    Ok(())
}

fn change<T>(target: &mut T, change: Option<T>) {
    if let Some(value) = change {
        *target = value;
    }
}

fn change_optional<T>(target: &mut Option<T>, change: Option<T>) {
    if let Some(value) = change {
        *target = Some(value);
    }
}

fn reference(
    out: &mut Vec<Reference>,
    collection: Collection,
    id: &Option<String>,
    label: &'static str,
) {
    if let Some(id) = id {
        out.push(Reference {
            collection,
            id: id.clone(),
            label,
        });
    }
}

impl Document for SoldierFields {
    const COLLECTION: Collection = Collection::Soldiers;
    type Changes = SoldierChanges;

    fn validate(self) -> Result<Self, StoreError> {
        coordinates(self.latitude, self.longitude)?;
        Ok(Self {
            first_name: required(self.first_name, "First name")?,
            last_name: required(self.last_name, "Last name")?,
            rank: optional(self.rank),
            unit_id: optional(self.unit_id),
            location_id: optional(self.location_id),
            ..self
        })
    }

    fn apply(&mut self, c: SoldierChanges) -> Result<(), StoreError> {
        change_required(&mut self.first_name, c.first_name, "First name")?;
        change_required(&mut self.last_name, c.last_name, "Last name")?;
        change_optional(&mut self.rank, c.rank);
        change_optional(&mut self.unit_id, c.unit_id);
        change_optional(&mut self.location_id, c.location_id);
        change_optional(&mut self.latitude, c.latitude);
        change_optional(&mut self.longitude, c.longitude);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        reference(&mut out, Collection::Units, &self.unit_id, "Unit");
        reference(&mut out, Collection::Locations, &self.location_id, "Location");
        out
    }

    fn coordinate(&self) -> (Option<f64>, Option<f64>) {
        (self.latitude, self.longitude)
    }
}

impl Document for UnitFields {
    const COLLECTION: Collection = Collection::Units;
    type Changes = UnitChanges;

    fn validate(self) -> Result<Self, StoreError> {
        non_negative(self.size, "Size")?;
        coordinates(self.latitude, self.longitude)?;
        Ok(Self {
            name: required(self.name, "Name")?,
            status: required(self.status, "Status")?,
            commander_id: optional(self.commander_id),
            base_id: optional(self.base_id),
            ..self
        })
    }

    fn apply(&mut self, c: UnitChanges) -> Result<(), StoreError> {
        change_required(&mut self.name, c.name, "Name")?;
        change_required(&mut self.status, c.status, "Status")?;
        change_optional(&mut self.size, c.size);
        change_optional(&mut self.commander_id, c.commander_id);
        change_optional(&mut self.base_id, c.base_id);
        change_optional(&mut self.latitude, c.latitude);
        change_optional(&mut self.longitude, c.longitude);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        reference(&mut out, Collection::Soldiers, &self.commander_id, "Commander");
        reference(&mut out, Collection::Bases, &self.base_id, "Base");
        out
    }

    fn coordinate(&self) -> (Option<f64>, Option<f64>) {
        (self.latitude, self.longitude)
    }
}

impl Document for VehicleFields {
    const COLLECTION: Collection = Collection::Vehicles;
    type Changes = VehicleChanges;

    fn validate(self) -> Result<Self, StoreError> {
        coordinates(self.latitude, self.longitude)?;
        Ok(Self {
            kind: required(self.kind, "Type")?,
            status: required(self.status, "Status")?,
            unit_id: optional(self.unit_id),
            location_id: optional(self.location_id),
            ..self
        })
    }

    fn apply(&mut self, c: VehicleChanges) -> Result<(), StoreError> {
        change_required(&mut self.kind, c.kind, "Type")?;
        change_required(&mut self.status, c.status, "Status")?;
        change_optional(&mut self.unit_id, c.unit_id);
        change_optional(&mut self.location_id, c.location_id);
        change_optional(&mut self.latitude, c.latitude);
        change_optional(&mut self.longitude, c.longitude);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        reference(&mut out, Collection::Units, &self.unit_id, "Unit");
        reference(&mut out, Collection::Locations, &self.location_id, "Location");
        out
    }

    fn coordinate(&self) -> (Option<f64>, Option<f64>) {
        (self.latitude, self.longitude)
    }
}

impl Document for BaseFields {
    const COLLECTION: Collection = Collection::Bases;
    type Changes = BaseChanges;

    fn validate(self) -> Result<Self, StoreError> {
        non_negative(self.capacity, "Capacity")?;
        coordinates(self.latitude, self.longitude)?;
        Ok(Self {
            name: required(self.name, "Name")?,
            location_id: optional(self.location_id),
            ..self
        })
    }

    fn apply(&mut self, c: BaseChanges) -> Result<(), StoreError> {
        change_required(&mut self.name, c.name, "Name")?;
        change_optional(&mut self.capacity, c.capacity);
        change_optional(&mut self.location_id, c.location_id);
        change_optional(&mut self.latitude, c.latitude);
        change_optional(&mut self.longitude, c.longitude);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        reference(&mut out, Collection::Locations, &self.location_id, "Location");
        out
    }

    fn coordinate(&self) -> (Option<f64>, Option<f64>) {
        (self.latitude, self.longitude)
    }
}

impl Document for MissionFields {
    const COLLECTION: Collection = Collection::Missions;
    type Changes = MissionChanges;

    fn validate(self) -> Result<Self, StoreError> {
        coordinates(self.latitude, self.longitude)?;
        let name = required(self.name, "Name")?;
        let start = required(self.start, "Start date")?;
        iso_date(&start, "Start date")?;
        let end = optional(self.end);
        if let Some(end) = &end {
            iso_date(end, "End date")?;
        }
        Ok(Self {
            name,
            start,
            end,
            status: required(self.status, "Status")?,
            description: optional(self.description),
            unit_id: optional(self.unit_id),
            location_id: optional(self.location_id),
            ..self
        })
    }

    fn apply(&mut self, c: MissionChanges) -> Result<(), StoreError> {
        change_required(&mut self.name, c.name, "Name")?;
        change_required(&mut self.start, c.start, "Start date")?;
        change_required(&mut self.status, c.status, "Status")?;
        change_optional(&mut self.description, c.description);
        change_optional(&mut self.end, c.end);
        change_optional(&mut self.unit_id, c.unit_id);
        change_optional(&mut self.location_id, c.location_id);
        change_optional(&mut self.latitude, c.latitude);
        change_optional(&mut self.longitude, c.longitude);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        reference(&mut out, Collection::Units, &self.unit_id, "Unit");
        reference(&mut out, Collection::Locations, &self.location_id, "Location");
        out
    }

    fn coordinate(&self) -> (Option<f64>, Option<f64>) {
        (self.latitude, self.longitude)
    }
}

impl Document for DeliveryFields {
    const COLLECTION: Collection = Collection::Deliveries;
    type Changes = DeliveryChanges;

    fn validate(self) -> Result<Self, StoreError> {
        non_negative(Some(self.quantity), "Quantity")?;
        coordinates(self.latitude, self.longitude)?;
        Ok(Self {
            kind: required(self.kind, "Type")?,
            status: required(self.status, "Status")?,
            sender_location_id: optional(self.sender_location_id),
            receiver_location_id: optional(self.receiver_location_id),
            ..self
        })
    }

    fn apply(&mut self, c: DeliveryChanges) -> Result<(), StoreError> {
        change_required(&mut self.kind, c.kind, "Type")?;
        change_required(&mut self.status, c.status, "Status")?;
        change(&mut self.quantity, c.quantity);
        change_optional(&mut self.sender_location_id, c.sender_location_id);
        change_optional(&mut self.receiver_location_id, c.receiver_location_id);
        change_optional(&mut self.latitude, c.latitude);
        change_optional(&mut self.longitude, c.longitude);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        reference(
            &mut out,
            Collection::Locations,
            &self.sender_location_id,
            "Sender location",
        );
        reference(
            &mut out,
            Collection::Locations,
            &self.receiver_location_id,
            "Receiver location",
        );
        out
    }

    fn coordinate(&self) -> (Option<f64>, Option<f64>) {
        (self.latitude, self.longitude)
    }
}

impl Document for EnemyFields {
    const COLLECTION: Collection = Collection::Enemies;
    type Changes = EnemyChanges;

    fn validate(self) -> Result<Self, StoreError> {
        non_negative(self.estimated_strength, "Estimated strength")?;
        coordinates(self.latitude, self.longitude)?;
        Ok(Self {
            kind: optional(self.kind),
            threat_level: optional(self.threat_level),
            location_id: optional(self.location_id),
            ..self
        })
    }

    fn apply(&mut self, c: EnemyChanges) -> Result<(), StoreError> {
        change_optional(&mut self.kind, c.kind);
        change_optional(&mut self.estimated_strength, c.estimated_strength);
        change_optional(&mut self.threat_level, c.threat_level);
        change_optional(&mut self.location_id, c.location_id);
        change_optional(&mut self.latitude, c.latitude);
        change_optional(&mut self.longitude, c.longitude);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        reference(&mut out, Collection::Locations, &self.location_id, "Location");
        out
    }

    fn coordinate(&self) -> (Option<f64>, Option<f64>) {
        (self.latitude, self.longitude)
    }
}

impl Document for LocationFields {
    const COLLECTION: Collection = Collection::Locations;
    type Changes = LocationChanges;

    fn validate(self) -> Result<Self, StoreError> {
        coordinates(Some(self.latitude), Some(self.longitude))?;
        Ok(Self {
            name: optional(self.name),
            kind: optional(self.kind),
            ..self
        })
    }

    fn apply(&mut self, c: LocationChanges) -> Result<(), StoreError> {
        change(&mut self.latitude, c.latitude);
        change(&mut self.longitude, c.longitude);
        change_optional(&mut self.name, c.name);
        change_optional(&mut self.kind, c.kind);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    fn coordinate(&self) -> (Option<f64>, Option<f64>) {
        (Some(self.latitude), Some(self.longitude))
    }
}

impl Document for ArmamentFields {
    const COLLECTION: Collection = Collection::Armaments;
    type Changes = ArmamentChanges;

    fn validate(self) -> Result<Self, StoreError> {
        non_negative(Some(self.quantity), "Quantity")?;
        Ok(Self {
            kind: required(self.kind, "Type")?,
            status: required(self.status, "Status")?,
            unit_id: optional(self.unit_id),
            soldier_id: optional(self.soldier_id),
            ..self
        })
    }

    fn apply(&mut self, c: ArmamentChanges) -> Result<(), StoreError> {
        change_required(&mut self.kind, c.kind, "Type")?;
        change_required(&mut self.status, c.status, "Status")?;
        change(&mut self.quantity, c.quantity);
        change_optional(&mut self.unit_id, c.unit_id);
        change_optional(&mut self.soldier_id, c.soldier_id);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        reference(&mut out, Collection::Units, &self.unit_id, "Unit");
        reference(&mut out, Collection::Soldiers, &self.soldier_id, "Soldier");
        out
    }
}

impl Document for EventFields {
    const COLLECTION: Collection = Collection::Events;
    type Changes = EventChanges;

    fn validate(self) -> Result<Self, StoreError> {
        let time = optional(self.time);
        if let Some(time) = &time {
            iso_date(time, "Time")?;
        }
        Ok(Self {
            kind: optional(self.kind),
            description: optional(self.description),
            time,
            mission_id: optional(self.mission_id),
        })
    }

    fn apply(&mut self, c: EventChanges) -> Result<(), StoreError> {
        change_optional(&mut self.kind, c.kind);
        change_optional(&mut self.description, c.description);
        change_optional(&mut self.time, c.time);
        change_optional(&mut self.mission_id, c.mission_id);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        reference(&mut out, Collection::Missions, &self.mission_id, "Mission");
        out
    }
}

macro_rules! placeable {
    ($($fields:ty => $variant:ident),* $(,)?) => {
        $(
            impl Placeable for $fields {
                const OBJECT_TYPE: MapObjectType = MapObjectType::$variant;

                fn into_map_object(record: Record<Self>) -> MapObject {
                    MapObject::$variant(record)
                }
            }
        )*
    };
}

placeable! {
    SoldierFields => Soldier,
    UnitFields => Unit,
    VehicleFields => Vehicle,
    LocationFields => Location,
    BaseFields => Base,
    MissionFields => Mission,
    DeliveryFields => Delivery,
    EnemyFields => Enemy,
}
