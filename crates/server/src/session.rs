use tacmap_engine::{Engine, StoreError};
use tacmap_protocol::{Coordinate, MapObject, MapObjectType};

use crate::forms::FormValues;
use crate::menu::{Menu, MenuError, PendingWrite, WriteDone};
use crate::placement::Placement;

/// Objects currently drawn on the map. Only objects with a coordinate are
/// kept.
#[derive(Debug, Default, Clone)]
pub struct ObjectList {
    objects: Vec<MapObject>,
}

impl ObjectList {
    pub fn new(objects: Vec<MapObject>) -> Self {
        let mut list = Self::default();
        for object in objects {
            list.push(object);
        }
        list
    }

    pub fn as_slice(&self) -> &[MapObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MapObject> {
        self.objects.iter().find(|o| o.id() == id)
    }

    pub fn push(&mut self, object: MapObject) {
        if object.coordinate().is_some() {
            self.objects.push(object);
        }
    }

    /// Replaces the object with the same id, adding it if it was not shown
    /// before. An object that lost its coordinate is dropped.
    pub fn upsert(&mut self, object: MapObject) {
        match self.objects.iter().position(|o| o.id() == object.id()) {
            Some(i) if object.coordinate().is_some() => self.objects[i] = object,
            Some(i) => {
                self.objects.remove(i);
            }
            None => self.push(object),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<MapObject> {
        let i = self.objects.iter().position(|o| o.id() == id)?;
        Some(self.objects.remove(i))
    }
}

/// Everything one map screen holds between requests.
#[derive(Debug, Default)]
pub struct Session {
    pub placement: Placement,
    pub menu: Menu,
    pub objects: ObjectList,
    /// Set when the initial object load failed; the map still works.
    pub banner: Option<String>,
}

impl Session {
    pub fn load(engine: &Engine) -> Self {
        match engine.map_objects() {
            Ok(objects) => Self {
                objects: ObjectList::new(objects),
                ..Self::default()
            },
            Err(err) => {
                tracing::warn!(%err, "loading map objects failed");
                Self {
                    banner: Some(format!("Could not load map objects: {err}")),
                    ..Self::default()
                }
            }
        }
    }

    pub fn select_type(&mut self, object_type: MapObjectType) {
        self.placement.select_type(object_type);
    }

    /// Returns whether the click opened a form.
    pub fn map_click(&mut self, at: Option<Coordinate>) -> bool {
        match self.placement.on_map_click(at) {
            Some(builder) => {
                self.menu.open(builder);
                true
            }
            None => false,
        }
    }

    pub fn finish(&mut self, pending: PendingWrite, outcome: Result<WriteDone, StoreError>) {
        self.menu.finish(pending, outcome, &mut self.objects);
    }

    /// Runs a submit to completion on the calling thread.
    pub fn submit(&mut self, engine: &Engine, values: FormValues) -> Result<WriteDone, MenuError> {
        let pending = self.menu.prepare_submit(values)?;
        self.run(engine, pending)
    }

    /// Runs a delete to completion on the calling thread.
    pub fn delete(&mut self, engine: &Engine, id: &str) -> Result<WriteDone, MenuError> {
        let pending = self.menu.prepare_delete(id)?;
        self.run(engine, pending)
    }

    fn run(&mut self, engine: &Engine, pending: PendingWrite) -> Result<WriteDone, MenuError> {
        let outcome = pending.execute(engine);
        let result = outcome.clone().map_err(MenuError::from);
        self.finish(pending, outcome);
        result
    }
}
