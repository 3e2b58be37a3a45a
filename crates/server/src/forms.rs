//! Per-type contextual menus.
//!
//! Each placeable type has one [`MenuHandler`], looked up through
//! [`handler_for`]. Handlers describe their form fields and translate between
//! form text and the store's typed documents.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tacmap_engine::{Engine, Placeable, StoreError};
use tacmap_protocol::records::*;
use tacmap_protocol::{Collection, Coordinate, MapObject, MapObjectType, Removed, Summary};

/// Raw form text keyed by field name.
pub type FormValues = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Whole number; parsed before it reaches the store.
    Number,
    Date,
    /// Id of a record in another collection.
    Reference(Collection),
}

impl FieldKind {
    pub fn input_type(self) -> &'static str {
        match self {
            Self::Text | Self::Reference(_) => "text",
            Self::Number => "number",
            Self::Date => "date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Wire name of the document field.
    pub name: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

const fn text(name: &'static str, label: &'static str, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        label,
        required,
        kind: FieldKind::Text,
    }
}

const fn number(name: &'static str, label: &'static str, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        label,
        required,
        kind: FieldKind::Number,
    }
}

const fn date(name: &'static str, label: &'static str, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        label,
        required,
        kind: FieldKind::Date,
    }
}

const fn link(name: &'static str, label: &'static str, to: Collection) -> FieldSpec {
    FieldSpec {
        name,
        label,
        required: false,
        kind: FieldKind::Reference(to),
    }
}

pub const SOLDIER_FORM: &[FieldSpec] = &[
    text("firstName", "First name", true),
    text("lastName", "Last name", true),
    text("rank", "Rank", false),
    link("unitId", "Unit", Collection::Units),
];

pub const UNIT_FORM: &[FieldSpec] = &[
    text("name", "Name", true),
    text("status", "Status", true),
    number("size", "Size", false),
    link("commanderId", "Commander", Collection::Soldiers),
    link("baseId", "Base", Collection::Bases),
];

pub const VEHICLE_FORM: &[FieldSpec] = &[
    text("type", "Type", true),
    text("status", "Status", true),
    link("unitId", "Unit", Collection::Units),
];

pub const LOCATION_FORM: &[FieldSpec] = &[text("name", "Name", false), text("type", "Type", false)];

pub const BASE_FORM: &[FieldSpec] = &[
    text("name", "Name", true),
    number("capacity", "Capacity", false),
];

pub const MISSION_FORM: &[FieldSpec] = &[
    text("name", "Name", true),
    text("status", "Status", true),
    date("start", "Start date", true),
    date("end", "End date", false),
    text("description", "Description", false),
    link("unitId", "Unit", Collection::Units),
];

pub const DELIVERY_FORM: &[FieldSpec] = &[
    text("type", "Type", true),
    number("quantity", "Quantity", true),
    text("status", "Status", true),
    link("senderLocationId", "Sender location", Collection::Locations),
    link("receiverLocationId", "Receiver location", Collection::Locations),
];

pub const ENEMY_FORM: &[FieldSpec] = &[
    text("type", "Type", false),
    number("estimatedStrength", "Estimated strength", false),
    text("threatLevel", "Threat level", false),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedEntity {
    pub id: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

pub trait MenuHandler: Sync {
    fn object_type(&self) -> MapObjectType;

    fn form(&self) -> &'static [FieldSpec];

    fn list(&self, engine: &Engine) -> Result<Vec<ListedEntity>, StoreError>;

    /// Current field values of a stored record, as form text.
    fn load(&self, engine: &Engine, id: &str) -> Result<FormValues, StoreError>;

    fn create(&self, engine: &Engine, body: Map<String, Value>) -> Result<MapObject, StoreError>;

    fn update(
        &self,
        engine: &Engine,
        id: &str,
        body: Map<String, Value>,
    ) -> Result<MapObject, StoreError>;

    fn remove(&self, engine: &Engine, id: &str) -> Result<Removed, StoreError>;
}

struct DocumentMenu<D> {
    form: &'static [FieldSpec],
    _doc: PhantomData<fn() -> D>,
}

impl<D> DocumentMenu<D> {
    const fn new(form: &'static [FieldSpec]) -> Self {
        Self {
            form,
            _doc: PhantomData,
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: Map<String, Value>) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(body)).map_err(|e| StoreError::validation(e.to_string()))
}

impl<D: Placeable + Summary> MenuHandler for DocumentMenu<D> {
    fn object_type(&self) -> MapObjectType {
        D::OBJECT_TYPE
    }

    fn form(&self) -> &'static [FieldSpec] {
        self.form
    }

    fn list(&self, engine: &Engine) -> Result<Vec<ListedEntity>, StoreError> {
        Ok(engine
            .store::<D>()
            .list()?
            .into_iter()
            .map(|r| {
                let summary = r.fields.summary();
                let id = r.id.clone();
                ListedEntity {
                    coordinate: D::into_map_object(r).coordinate(),
                    id,
                    summary,
                }
            })
            .collect())
    }

    fn load(&self, engine: &Engine, id: &str) -> Result<FormValues, StoreError> {
        let record = engine.store::<D>().get(id)?;
        let json = serde_json::to_value(&record.fields)?;
        Ok(form_values(self.form, &json))
    }

    fn create(&self, engine: &Engine, body: Map<String, Value>) -> Result<MapObject, StoreError> {
        let fields: D = decode(body)?;
        let record = engine.store::<D>().create(fields)?;
        Ok(D::into_map_object(record))
    }

    fn update(
        &self,
        engine: &Engine,
        id: &str,
        body: Map<String, Value>,
    ) -> Result<MapObject, StoreError> {
        let changes: D::Changes = decode(body)?;
        let record = engine.store::<D>().update(id, changes)?;
        Ok(D::into_map_object(record))
    }

    fn remove(&self, engine: &Engine, id: &str) -> Result<Removed, StoreError> {
        engine.store::<D>().remove(id)
    }
}

static SOLDIER: DocumentMenu<SoldierFields> = DocumentMenu::new(SOLDIER_FORM);
static UNIT: DocumentMenu<UnitFields> = DocumentMenu::new(UNIT_FORM);
static VEHICLE: DocumentMenu<VehicleFields> = DocumentMenu::new(VEHICLE_FORM);
static LOCATION: DocumentMenu<LocationFields> = DocumentMenu::new(LOCATION_FORM);
static BASE: DocumentMenu<BaseFields> = DocumentMenu::new(BASE_FORM);
static MISSION: DocumentMenu<MissionFields> = DocumentMenu::new(MISSION_FORM);
static DELIVERY: DocumentMenu<DeliveryFields> = DocumentMenu::new(DELIVERY_FORM);
static ENEMY: DocumentMenu<EnemyFields> = DocumentMenu::new(ENEMY_FORM);

pub fn handler_for(object_type: MapObjectType) -> &'static dyn MenuHandler {
    match object_type {
        MapObjectType::Soldier => &SOLDIER,
        MapObjectType::Unit => &UNIT,
        MapObjectType::Vehicle => &VEHICLE,
        MapObjectType::Location => &LOCATION,
        MapObjectType::Base => &BASE,
        MapObjectType::Mission => &MISSION,
        MapObjectType::Delivery => &DELIVERY,
        MapObjectType::Enemy => &ENEMY,
    }
}

/// Projects a serialized document onto the form's fields.
pub fn form_values(form: &[FieldSpec], json: &Value) -> FormValues {
    form.iter()
        .map(|f| {
            let text = match json.get(f.name) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(b)) => b.to_string(),
                _ => String::new(),
            };
            (f.name.to_string(), text)
        })
        .collect()
}

/// Turns form text into a store body.
///
/// Every field is trimmed and blank ones are left out. With `original` set
/// (editing an existing record) fields whose text did not change are left out
/// as well, so the store only sees what the user touched.
pub fn build_body(
    form: &[FieldSpec],
    values: &FormValues,
    original: Option<&FormValues>,
) -> Result<Map<String, Value>, Vec<FieldError>> {
    let mut body = Map::new();
    let mut errors = Vec::new();

    for field in form {
        let value = values.get(field.name).map(|v| v.trim()).unwrap_or_default();
        if value.is_empty() {
            if field.required {
                errors.push(FieldError {
                    field: field.name,
                    message: format!("{} is required", field.label),
                });
            }
            continue;
        }
        if let Some(original) = original {
            let before = original.get(field.name).map(|v| v.trim()).unwrap_or_default();
            if before == value {
                continue;
            }
        }
        let json = match field.kind {
            FieldKind::Number => match value.parse::<i64>() {
                Ok(n) => Value::from(n),
                Err(_) => {
                    errors.push(FieldError {
                        field: field.name,
                        message: format!("{} must be a whole number", field.label),
                    });
                    continue;
                }
            },
            FieldKind::Text | FieldKind::Date | FieldKind::Reference(_) => {
                Value::from(value.to_string())
            }
        };
        body.insert(field.name.to_string(), json);
    }

    if errors.is_empty() {
        Ok(body)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> FormValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn every_type_has_a_handler_for_itself() {
        for t in MapObjectType::ALL {
            assert_eq!(handler_for(t).object_type(), t);
        }
    }

    #[test]
    fn create_body_trims_and_reports_required_fields() {
        let body = build_body(
            SOLDIER_FORM,
            &values(&[("firstName", " John "), ("lastName", "Doe"), ("rank", "  ")]),
            None,
        )
        .unwrap();
        assert_eq!(body.get("firstName"), Some(&Value::from("John")));
        assert!(body.get("rank").is_none());

        let errors = build_body(SOLDIER_FORM, &values(&[("firstName", "John")]), None).unwrap_err();
        assert_eq!(
            errors,
            vec![FieldError {
                field: "lastName",
                message: "Last name is required".to_string()
            }]
        );
    }

    #[test]
    fn numbers_must_parse() {
        let errors = build_body(
            DELIVERY_FORM,
            &values(&[("type", "fuel"), ("quantity", "lots"), ("status", "queued")]),
            None,
        )
        .unwrap_err();
        assert_eq!(errors[0].field, "quantity");
        assert_eq!(errors[0].message, "Quantity must be a whole number");

        let body = build_body(
            DELIVERY_FORM,
            &values(&[("type", "fuel"), ("quantity", "40"), ("status", "queued")]),
            None,
        )
        .unwrap();
        assert_eq!(body.get("quantity"), Some(&Value::from(40)));
    }

    #[test]
    fn update_body_only_carries_changed_fields() {
        let original = values(&[("firstName", "John"), ("lastName", "Doe"), ("rank", "Private")]);
        let edited = values(&[("firstName", "John"), ("lastName", "Doe"), ("rank", "Corporal")]);
        let body = build_body(SOLDIER_FORM, &edited, Some(&original)).unwrap();
        assert_eq!(body.len(), 1);
        assert_eq!(body.get("rank"), Some(&Value::from("Corporal")));
    }

    #[test]
    fn form_values_render_numbers_and_missing_fields() {
        let json = serde_json::json!({ "name": "Fort", "capacity": 300 });
        let v = form_values(BASE_FORM, &json);
        assert_eq!(v.get("name").map(String::as_str), Some("Fort"));
        assert_eq!(v.get("capacity").map(String::as_str), Some("300"));

        let v = form_values(SOLDIER_FORM, &serde_json::json!({ "firstName": "A" }));
        assert_eq!(v.get("rank").map(String::as_str), Some(""));
    }
}
