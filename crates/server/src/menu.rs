//! Contextual menu state machine.
//!
//! ```text
//! Empty --open(builder)--> EditingNew --edit(id)--> EditingExisting
//!   ^                          |                          |
//!   +---- cancel / saved ------+--------------------------+
//! ```
//!
//! Store writes are split into `prepare_*` (validate, mark busy, snapshot the
//! request), [`PendingWrite::execute`] (the store call, run without holding the
//! session) and [`Menu::finish`] (apply the outcome).

use serde::Serialize;
use std::collections::BTreeMap;
use tacmap_engine::{Engine, StoreError};
use tacmap_protocol::{MapObject, MapObjectBuilder, MapObjectType, StatusMessage};
use thiserror::Error;

use crate::forms::{build_body, handler_for, FieldError, FormValues, ListedEntity};
use crate::session::ObjectList;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum MenuMode {
    #[default]
    Empty,
    EditingNew {
        builder: MapObjectBuilder,
    },
    EditingExisting {
        builder: MapObjectBuilder,
        id: String,
        /// Values as loaded, used to send only what changed.
        original: FormValues,
    },
}

impl MenuMode {
    pub fn builder(&self) -> Option<&MapObjectBuilder> {
        match self {
            Self::Empty => None,
            Self::EditingNew { builder } | Self::EditingExisting { builder, .. } => Some(builder),
        }
    }

    pub fn editing_id(&self) -> Option<&str> {
        match self {
            Self::EditingExisting { id, .. } => Some(id),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::EditingNew { .. } => "new",
            Self::EditingExisting { .. } => "existing",
        }
    }
}

#[derive(Debug, Error)]
pub enum MenuError {
    #[error("A request is already in progress.")]
    Busy,
    #[error("Select a location on the map to start.")]
    NoForm,
    #[error("{}", .0.first().map(|e| e.message.as_str()).unwrap_or("Invalid form."))]
    Fields(Vec<FieldError>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub enum WriteOp {
    Create { body: serde_json::Map<String, serde_json::Value> },
    Update { id: String, body: serde_json::Map<String, serde_json::Value> },
    Remove { id: String },
}

/// A store write that has passed form validation and is waiting to run.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    generation: u64,
    object_type: MapObjectType,
    op: WriteOp,
}

#[derive(Debug, Clone)]
pub enum WriteDone {
    Saved(MapObject),
    Removed(String),
}

impl PendingWrite {
    pub fn object_type(&self) -> MapObjectType {
        self.object_type
    }

    pub fn op(&self) -> &WriteOp {
        &self.op
    }

    pub fn execute(&self, engine: &Engine) -> Result<WriteDone, StoreError> {
        let handler = handler_for(self.object_type);
        match &self.op {
            WriteOp::Create { body } => handler.create(engine, body.clone()).map(WriteDone::Saved),
            WriteOp::Update { id, body } => handler
                .update(engine, id, body.clone())
                .map(WriteDone::Saved),
            WriteOp::Remove { id } => handler
                .remove(engine, id)
                .map(|removed| WriteDone::Removed(removed.id)),
        }
    }
}

/// Entities of the menu's type as the store currently has them. Refetched
/// whenever the store revision moves, independent of the map's object list.
#[derive(Debug, Default, Clone)]
pub struct LiveList {
    object_type: Option<MapObjectType>,
    seen_rev: Option<i64>,
    entries: Vec<ListedEntity>,
    error: Option<String>,
}

/// A store read for the live list, taken without the session.
#[derive(Debug)]
pub enum LiveFetch {
    Cleared,
    Unchanged { object_type: MapObjectType },
    Loaded {
        object_type: MapObjectType,
        rev: i64,
        entries: Vec<ListedEntity>,
    },
    Failed {
        object_type: MapObjectType,
        error: String,
    },
}

impl LiveFetch {
    pub fn object_type(&self) -> Option<MapObjectType> {
        match self {
            Self::Cleared => None,
            Self::Unchanged { object_type }
            | Self::Loaded { object_type, .. }
            | Self::Failed { object_type, .. } => Some(*object_type),
        }
    }
}

impl LiveList {
    pub fn entries(&self) -> &[ListedEntity] {
        &self.entries
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn invalidate(&mut self) {
        self.seen_rev = None;
    }

    /// The type and revision the entries were read at, if they are current.
    pub fn seen(&self) -> Option<(MapObjectType, i64)> {
        Some((self.object_type?, self.seen_rev?))
    }

    /// Skips the list query when `seen` already matches the store revision.
    pub fn fetch(
        engine: &Engine,
        object_type: Option<MapObjectType>,
        seen: Option<(MapObjectType, i64)>,
    ) -> LiveFetch {
        let Some(object_type) = object_type else {
            return LiveFetch::Cleared;
        };
        let rev = match engine.get_rev() {
            Ok(rev) => rev,
            Err(err) => {
                return LiveFetch::Failed {
                    object_type,
                    error: err.to_string(),
                }
            }
        };
        if seen == Some((object_type, rev)) {
            return LiveFetch::Unchanged { object_type };
        }
        match handler_for(object_type).list(engine) {
            Ok(entries) => LiveFetch::Loaded {
                object_type,
                rev,
                entries,
            },
            Err(err) => LiveFetch::Failed {
                object_type,
                error: err.to_string(),
            },
        }
    }

    /// Returns whether the entries were replaced.
    pub fn apply(&mut self, fetched: LiveFetch) -> bool {
        match fetched {
            LiveFetch::Cleared => {
                self.object_type = None;
                self.seen_rev = None;
                self.entries.clear();
                self.error = None;
                false
            }
            LiveFetch::Unchanged { .. } => false,
            LiveFetch::Loaded {
                object_type,
                rev,
                entries,
            } => {
                self.object_type = Some(object_type);
                self.seen_rev = Some(rev);
                self.entries = entries;
                self.error = None;
                true
            }
            LiveFetch::Failed { object_type, error } => {
                tracing::warn!(%object_type, %error, "live list refresh failed");
                // Entries of another type must never show under this form.
                if self.object_type != Some(object_type) {
                    self.entries.clear();
                }
                self.object_type = Some(object_type);
                self.seen_rev = None;
                self.error = Some(error);
                false
            }
        }
    }

    pub fn refresh(&mut self, engine: &Engine, object_type: Option<MapObjectType>) -> bool {
        let fetched = Self::fetch(engine, object_type, self.seen());
        self.apply(fetched)
    }
}

#[derive(Debug, Default)]
pub struct Menu {
    mode: MenuMode,
    values: FormValues,
    field_errors: BTreeMap<&'static str, String>,
    status: Option<StatusMessage>,
    busy: bool,
    /// Bumped on every mode change so a late write result does not reset a
    /// form the user has since moved on from.
    generation: u64,
    live: LiveList,
}

impl Menu {
    pub fn mode(&self) -> &MenuMode {
        &self.mode
    }

    pub fn object_type(&self) -> Option<MapObjectType> {
        self.mode.builder().map(|b| b.object_type)
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn live(&self) -> &LiveList {
        &self.live
    }

    pub fn refresh_live(&mut self, engine: &Engine) -> bool {
        let fetched = LiveList::fetch(engine, self.object_type(), self.live.seen());
        self.apply_live(fetched)
    }

    /// Applies a live list read. A read for a type the form no longer shows
    /// is dropped and the list refetched next time.
    pub fn apply_live(&mut self, fetched: LiveFetch) -> bool {
        let current = self.object_type();
        if fetched.object_type() == current {
            return self.live.apply(fetched);
        }
        tracing::debug!(fetched = ?fetched.object_type(), ?current, "stale live list read dropped");
        match current {
            None => self.live.apply(LiveFetch::Cleared),
            Some(_) => {
                self.live.invalidate();
                false
            }
        }
    }

    fn transition(&mut self, mode: MenuMode) {
        self.mode = mode;
        self.values.clear();
        self.field_errors.clear();
        self.generation += 1;
    }

    /// Shows the form for a fresh builder, replacing any unsaved one.
    pub fn open(&mut self, builder: MapObjectBuilder) {
        self.transition(MenuMode::EditingNew { builder });
        self.status = None;
    }

    pub fn cancel(&mut self) {
        self.transition(MenuMode::Empty);
        self.status = None;
    }

    /// Loads a listed record into the form.
    pub fn edit(&mut self, engine: &Engine, id: &str) -> Result<(), MenuError> {
        let Some(object_type) = self.object_type() else {
            return self.fail(MenuError::NoForm);
        };
        let loaded = handler_for(object_type).load(engine, id);
        self.apply_edit(object_type, id, loaded)
    }

    /// Opens a record read for `object_type`. Refused when the form has since
    /// closed or switched type.
    pub fn apply_edit(
        &mut self,
        object_type: MapObjectType,
        id: &str,
        loaded: Result<FormValues, StoreError>,
    ) -> Result<(), MenuError> {
        let Some(builder) = self
            .mode
            .builder()
            .copied()
            .filter(|b| b.object_type == object_type)
        else {
            return self.fail(MenuError::NoForm);
        };
        let loaded = match loaded {
            Ok(values) => values,
            Err(err) => return self.fail(err.into()),
        };
        self.transition(MenuMode::EditingExisting {
            builder,
            id: id.to_string(),
            original: loaded.clone(),
        });
        self.values = loaded;
        self.status = None;
        Ok(())
    }

    pub fn prepare_submit(&mut self, values: FormValues) -> Result<PendingWrite, MenuError> {
        if self.busy {
            return self.fail(MenuError::Busy);
        }
        let Some(builder) = self.mode.builder().copied() else {
            return self.fail(MenuError::NoForm);
        };
        self.values = values;
        self.field_errors.clear();

        let form = handler_for(builder.object_type).form();
        let built = match &self.mode {
            MenuMode::EditingExisting { id, original, .. } => {
                build_body(form, &self.values, Some(original)).map(|body| WriteOp::Update {
                    id: id.clone(),
                    body,
                })
            }
            _ => build_body(form, &self.values, None).map(|mut body| {
                body.insert("latitude".to_string(), builder.latitude.into());
                body.insert("longitude".to_string(), builder.longitude.into());
                WriteOp::Create { body }
            }),
        };
        let op = match built {
            Ok(op) => op,
            Err(errors) => return self.fail_fields(errors),
        };

        Ok(self.begin(builder.object_type, op))
    }

    pub fn prepare_delete(&mut self, id: &str) -> Result<PendingWrite, MenuError> {
        if self.busy {
            return self.fail(MenuError::Busy);
        }
        let Some(object_type) = self.object_type() else {
            return self.fail(MenuError::NoForm);
        };
        Ok(self.begin(
            object_type,
            WriteOp::Remove {
                id: id.to_string(),
            },
        ))
    }

    fn begin(&mut self, object_type: MapObjectType, op: WriteOp) -> PendingWrite {
        self.busy = true;
        self.status = None;
        PendingWrite {
            generation: self.generation,
            object_type,
            op,
        }
    }

    fn fail<T>(&mut self, err: MenuError) -> Result<T, MenuError> {
        self.status = Some(StatusMessage::error(err.to_string()));
        Err(err)
    }

    fn fail_fields<T>(&mut self, errors: Vec<FieldError>) -> Result<T, MenuError> {
        for e in &errors {
            self.field_errors.insert(e.field, e.message.clone());
        }
        self.fail(MenuError::Fields(errors))
    }

    /// Releases the busy flag for a write whose outcome was lost.
    pub fn abandon(&mut self, err: StoreError) {
        self.busy = false;
        self.status = Some(StatusMessage::error(err.to_string()));
    }

    /// Applies a finished write to the menu and the map's object list.
    pub fn finish(
        &mut self,
        pending: PendingWrite,
        outcome: Result<WriteDone, StoreError>,
        objects: &mut ObjectList,
    ) {
        self.busy = false;
        let label = pending.object_type.label();
        let current = pending.generation == self.generation;

        let done = match outcome {
            Ok(done) => done,
            Err(err) => {
                tracing::warn!(object_type = %pending.object_type, %err, "menu write failed");
                self.status = Some(StatusMessage::error(err.to_string()));
                return;
            }
        };
        self.live.invalidate();

        match (pending.op, done) {
            (WriteOp::Create { .. }, WriteDone::Saved(object)) => {
                objects.push(object);
                self.status = Some(StatusMessage::success(format!(
                    "{label} created successfully."
                )));
                if current {
                    self.transition(MenuMode::Empty);
                }
            }
            (WriteOp::Update { .. }, WriteDone::Saved(object)) => {
                objects.upsert(object);
                self.status = Some(StatusMessage::success(format!(
                    "{label} updated successfully."
                )));
                if current {
                    self.transition(MenuMode::Empty);
                }
            }
            (_, WriteDone::Removed(id)) => {
                objects.remove(&id);
                self.status = Some(StatusMessage::success(format!(
                    "{label} removed from roster."
                )));
                if self.mode.editing_id() == Some(id.as_str()) {
                    if let Some(builder) = self.mode.builder().copied() {
                        self.transition(MenuMode::EditingNew { builder });
                    }
                }
            }
            (op, done) => {
                tracing::error!(?op, ?done, "write outcome does not match request");
            }
        }
    }

    pub fn view(&self) -> MenuView {
        let builder = self.mode.builder();
        let fields = builder
            .map(|b| {
                handler_for(b.object_type)
                    .form()
                    .iter()
                    .map(|f| FieldView {
                        name: f.name,
                        label: f.label,
                        required: f.required,
                        input: f.kind.input_type(),
                        value: self.values.get(f.name).cloned().unwrap_or_default(),
                        error: self.field_errors.get(f.name).cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        MenuView {
            mode: self.mode.name(),
            object_type: builder.map(|b| b.object_type),
            coordinate_label: builder.map(|b| b.coordinate().label()),
            editing_id: self.mode.editing_id().map(str::to_string),
            fields,
            status: self.status.clone(),
            busy: self.busy,
            entries: self.live.entries().to_vec(),
            list_error: self.live.error().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub input: &'static str,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuView {
    pub mode: &'static str,
    pub object_type: Option<MapObjectType>,
    pub coordinate_label: Option<String>,
    pub editing_id: Option<String>,
    pub fields: Vec<FieldView>,
    pub status: Option<StatusMessage>,
    pub busy: bool,
    pub entries: Vec<ListedEntity>,
    pub list_error: Option<String>,
}
