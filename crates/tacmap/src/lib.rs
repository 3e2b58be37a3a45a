//! Umbrella crate for tacmap.
//!
//! This crate is intentionally small: it re-exports the store engine and the wire
//! protocol so downstream code can depend on a single crate name (`tacmap`).

pub use tacmap_engine as engine;
pub use tacmap_protocol as protocol;

pub use tacmap_engine::{Engine, StoreError};
pub use tacmap_protocol::{MapObject, MapObjectBuilder, MapObjectType};
