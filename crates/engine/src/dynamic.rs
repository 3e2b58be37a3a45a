use serde_json::Value;
use std::marker::PhantomData;
use tacmap_protocol::records::*;
use tacmap_protocol::{Collection, Removed};

use crate::{Document, Engine, StoreError};

/// Store operations over JSON bodies for a collection picked at runtime
/// (HTTP routes, scripts). Each call decodes into the collection's typed
/// document and goes through the same rules as [`crate::Store`].
pub struct DynCollection<'a> {
    engine: &'a Engine,
    collection: Collection,
    ops: &'static dyn JsonOps,
}

impl<'a> DynCollection<'a> {
    pub(crate) fn new(engine: &'a Engine, collection: Collection) -> Self {
        Self {
            engine,
            collection,
            ops: ops_for(collection),
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn list(&self) -> Result<Vec<Value>, StoreError> {
        self.ops.list(self.engine)
    }

    pub fn get(&self, id: &str) -> Result<Value, StoreError> {
        self.ops.get(self.engine, id)
    }

    pub fn create(&self, body: Value) -> Result<Value, StoreError> {
        self.ops.create(self.engine, body)
    }

    pub fn update(&self, id: &str, body: Value) -> Result<Value, StoreError> {
        self.ops.update(self.engine, id, body)
    }

    pub fn remove(&self, id: &str) -> Result<Removed, StoreError> {
        self.ops.remove(self.engine, id)
    }
}

trait JsonOps: Sync {
    fn list(&self, engine: &Engine) -> Result<Vec<Value>, StoreError>;
    fn get(&self, engine: &Engine, id: &str) -> Result<Value, StoreError>;
    fn create(&self, engine: &Engine, body: Value) -> Result<Value, StoreError>;
    fn update(&self, engine: &Engine, id: &str, body: Value) -> Result<Value, StoreError>;
    fn remove(&self, engine: &Engine, id: &str) -> Result<Removed, StoreError>;
}

struct Typed<D>(PhantomData<fn() -> D>);

fn body<T: serde::de::DeserializeOwned>(collection: Collection, body: Value) -> Result<T, StoreError> {
    serde_json::from_value(body)
        .map_err(|e| StoreError::validation(format!("invalid {collection} body: {e}")))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(value)?)
}

impl<D: Document> JsonOps for Typed<D> {
    fn list(&self, engine: &Engine) -> Result<Vec<Value>, StoreError> {
        engine
            .store::<D>()
            .list()?
            .iter()
            .map(encode)
            .collect()
    }

    fn get(&self, engine: &Engine, id: &str) -> Result<Value, StoreError> {
        encode(&engine.store::<D>().get(id)?)
    }

    fn create(&self, engine: &Engine, value: Value) -> Result<Value, StoreError> {
        let fields: D = body(D::COLLECTION, value)?;
        encode(&engine.store::<D>().create(fields)?)
    }

    fn update(&self, engine: &Engine, id: &str, value: Value) -> Result<Value, StoreError> {
        let changes: D::Changes = body(D::COLLECTION, value)?;
        encode(&engine.store::<D>().update(id, changes)?)
    }

    fn remove(&self, engine: &Engine, id: &str) -> Result<Removed, StoreError> {
        engine.store::<D>().remove(id)
    }
}

fn ops_for(collection: Collection) -> &'static dyn JsonOps {
    match collection {
        Collection::Soldiers => &Typed::<SoldierFields>(PhantomData),
        Collection::Units => &Typed::<UnitFields>(PhantomData),
        Collection::Vehicles => &Typed::<VehicleFields>(PhantomData),
        Collection::Bases => &Typed::<BaseFields>(PhantomData),
        Collection::Missions => &Typed::<MissionFields>(PhantomData),
        Collection::Deliveries => &Typed::<DeliveryFields>(PhantomData),
        Collection::Enemies => &Typed::<EnemyFields>(PhantomData),
        Collection::Locations => &Typed::<LocationFields>(PhantomData),
        Collection::Armaments => &Typed::<ArmamentFields>(PhantomData),
        Collection::Events => &Typed::<EventFields>(PhantomData),
    }
}
