use anyhow::Context;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::collections::HashSet;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tacmap_protocol::{Collection, MapObject, MapObjectType, Record, Removed};

mod document;
mod dynamic;
mod error;

pub use document::{Document, Placeable, Reference};
pub use dynamic::DynCollection;
pub use error::StoreError;

pub use tacmap_protocol as protocol;

static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(i64::MAX)
}

fn new_id(prefix: &str) -> String {
    let c = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{c}", now_ms())
}

/// Handle to the document store. Cheap to clone; every call opens its own
/// connection so handles can move freely between threads.
#[derive(Debug, Clone)]
pub struct Engine {
    db_path: PathBuf,
}

impl Engine {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn open(&self) -> anyhow::Result<Connection> {
        let path = self.db_path.clone();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create db dir: {}", dir.display()))?;
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open sqlite db: {}", path.display()))?;

        // Durable + fast defaults.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        migrate(&conn)?;
        Ok(conn)
    }

    /// Typed accessor for one collection.
    pub fn store<D: Document>(&self) -> Store<'_, D> {
        Store {
            engine: self,
            _doc: PhantomData,
        }
    }

    /// JSON accessor for a collection chosen at runtime.
    pub fn collection(&self, collection: Collection) -> DynCollection<'_> {
        DynCollection::new(self, collection)
    }

    /// Monotonic store revision; advances on every successful write.
    pub fn get_rev(&self) -> Result<i64, StoreError> {
        let conn = self.open()?;
        let rev: Option<i64> =
            conn.query_row("SELECT MAX(seq) FROM event_log", [], |row| row.get(0))?;
        Ok(rev.unwrap_or(0))
    }

    /// Every placeable record that carries a coordinate, tagged with its type.
    pub fn map_objects(&self) -> Result<Vec<MapObject>, StoreError> {
        let mut out = Vec::new();
        for object_type in MapObjectType::ALL {
            let objects = match object_type {
                MapObjectType::Soldier => self.placed::<protocol::records::SoldierFields>()?,
                MapObjectType::Unit => self.placed::<protocol::records::UnitFields>()?,
                MapObjectType::Vehicle => self.placed::<protocol::records::VehicleFields>()?,
                MapObjectType::Location => self.placed::<protocol::records::LocationFields>()?,
                MapObjectType::Base => self.placed::<protocol::records::BaseFields>()?,
                MapObjectType::Mission => self.placed::<protocol::records::MissionFields>()?,
                MapObjectType::Delivery => self.placed::<protocol::records::DeliveryFields>()?,
                MapObjectType::Enemy => self.placed::<protocol::records::EnemyFields>()?,
            };
            out.extend(objects);
        }
        Ok(out)
    }

    fn placed<D: Placeable>(&self) -> Result<Vec<MapObject>, StoreError> {
        Ok(self
            .store::<D>()
            .list()?
            .into_iter()
            .map(D::into_map_object)
            .filter(|o| o.coordinate().is_some())
            .collect())
    }
}

/// `list` / `get` / `create` / `update` / `remove` for documents of type `D`.
pub struct Store<'a, D> {
    engine: &'a Engine,
    _doc: PhantomData<fn() -> D>,
}

impl<D: Document> Store<'_, D> {
    /// Newest first.
    pub fn list(&self) -> Result<Vec<Record<D>>, StoreError> {
        let conn = self.engine.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, payload_json, created_at_ms, updated_at_ms, rev FROM documents
             WHERE collection = ?1 ORDER BY created_at_ms DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([D::COLLECTION.as_str()], read_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(decode::<D>(row?)?);
        }
        Ok(out)
    }

    pub fn get(&self, id: &str) -> Result<Record<D>, StoreError> {
        let conn = self.engine.open()?;
        load::<D>(&conn, id)
    }

    pub fn create(&self, fields: D) -> Result<Record<D>, StoreError> {
        let fields = fields.validate()?;
        let mut conn = self.engine.open()?;
        let tx = conn.transaction()?;
        check_references(&tx, &fields.references())?;

        let collection = D::COLLECTION;
        let id = new_id(collection.id_prefix());
        let ts = now_ms();
        let payload_json = serde_json::to_string(&fields)?;
        let (latitude, longitude) = fields.coordinate();
        tx.execute(
            "INSERT INTO documents (id, collection, latitude, longitude, payload_json, created_at_ms, updated_at_ms, rev)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, 1)",
            (&id, collection.as_str(), latitude, longitude, &payload_json, ts),
        )?;
        append_event_tx(
            &tx,
            &format!("{collection}.created"),
            Some(&id),
            serde_json::json!({ "id": id, "collection": collection }),
        )?;
        tx.commit()?;
        tracing::info!(%collection, %id, "document created");

        Ok(Record {
            id,
            created_at_ms: ts,
            updated_at_ms: ts,
            rev: 1,
            fields,
        })
    }

    /// Merges `changes` into the stored document. References are checked only
    /// when the update points them somewhere new, so an untouched link to a
    /// since-deleted record does not block unrelated edits.
    pub fn update(&self, id: &str, changes: D::Changes) -> Result<Record<D>, StoreError> {
        let mut conn = self.engine.open()?;
        let tx = conn.transaction()?;
        let existing = load::<D>(&tx, id)?;

        let before: HashSet<Reference> = existing.fields.references().into_iter().collect();
        let mut fields = existing.fields;
        fields.apply(changes)?;
        let fields = fields.validate()?;
        let added: Vec<Reference> = fields
            .references()
            .into_iter()
            .filter(|r| !before.contains(r))
            .collect();
        check_references(&tx, &added)?;

        let collection = D::COLLECTION;
        let ts = now_ms();
        let payload_json = serde_json::to_string(&fields)?;
        let (latitude, longitude) = fields.coordinate();
        tx.execute(
            "UPDATE documents SET latitude = ?2, longitude = ?3, payload_json = ?4, updated_at_ms = ?5, rev = rev + 1
             WHERE id = ?1",
            (id, latitude, longitude, &payload_json, ts),
        )?;
        append_event_tx(
            &tx,
            &format!("{collection}.updated"),
            Some(id),
            serde_json::json!({ "id": id, "collection": collection }),
        )?;
        tx.commit()?;
        tracing::info!(%collection, %id, "document updated");

        Ok(Record {
            id: existing.id,
            created_at_ms: existing.created_at_ms,
            updated_at_ms: ts,
            rev: existing.rev + 1,
            fields,
        })
    }

    pub fn remove(&self, id: &str) -> Result<Removed, StoreError> {
        let collection = D::COLLECTION;
        let mut conn = self.engine.open()?;
        let tx = conn.transaction()?;
        let n = tx.execute(
            "DELETE FROM documents WHERE id = ?1 AND collection = ?2",
            (id, collection.as_str()),
        )?;
        if n == 0 {
            return Err(StoreError::not_found(collection.singular()));
        }
        append_event_tx(
            &tx,
            &format!("{collection}.deleted"),
            Some(id),
            serde_json::json!({ "id": id, "collection": collection }),
        )?;
        tx.commit()?;
        tracing::info!(%collection, %id, "document removed");
        Ok(Removed {
            success: true,
            id: id.to_string(),
        })
    }
}

struct Row {
    id: String,
    payload_json: String,
    created_at_ms: i64,
    updated_at_ms: i64,
    rev: i64,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    Ok(Row {
        id: row.get(0)?,
        payload_json: row.get(1)?,
        created_at_ms: row.get(2)?,
        updated_at_ms: row.get(3)?,
        rev: row.get(4)?,
    })
}

fn decode<D: Document>(row: Row) -> Result<Record<D>, StoreError> {
    Ok(Record {
        id: row.id,
        created_at_ms: row.created_at_ms,
        updated_at_ms: row.updated_at_ms,
        rev: row.rev,
        fields: serde_json::from_str(&row.payload_json)?,
    })
}

fn load<D: Document>(conn: &Connection, id: &str) -> Result<Record<D>, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, payload_json, created_at_ms, updated_at_ms, rev FROM documents
             WHERE id = ?1 AND collection = ?2",
            (id, D::COLLECTION.as_str()),
            read_row,
        )
        .optional()?;
    match row {
        Some(row) => decode(row),
        None => Err(StoreError::not_found(D::COLLECTION.singular())),
    }
}

fn check_references(conn: &Connection, refs: &[Reference]) -> Result<(), StoreError> {
    for r in refs {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM documents WHERE id = ?1 AND collection = ?2",
                (&r.id, r.collection.as_str()),
                |row| row.get(0),
            )
            .optional()?;
        if found.is_none() {
            return Err(StoreError::validation(format!("{} not found", r.label)));
        }
    }
    Ok(())
}

fn migrate(conn: &Connection) -> anyhow::Result<()> {
    let v: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if v < 1 {
        conn.execute_batch(
            r#"
-- Monotonic revision source for live lists.
CREATE TABLE IF NOT EXISTS event_log (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  ts_ms INTEGER NOT NULL,
  kind TEXT NOT NULL,
  entity_id TEXT,
  payload_json TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_event_log_ts ON event_log(ts_ms);
CREATE INDEX IF NOT EXISTS idx_event_log_kind ON event_log(kind);

-- One row per record across every collection. Coordinates are mirrored out of
-- the payload so map queries need not parse JSON.
CREATE TABLE IF NOT EXISTS documents (
  id TEXT PRIMARY KEY,
  collection TEXT NOT NULL,
  latitude REAL,
  longitude REAL,
  payload_json TEXT NOT NULL DEFAULT '{}',
  created_at_ms INTEGER NOT NULL,
  updated_at_ms INTEGER NOT NULL,
  rev INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(created_at_ms);
"#,
        )?;

        conn.pragma_update(None, "user_version", 1_i64)?;
        tracing::debug!("document store schema at version 1");
    }

    Ok(())
}

fn append_event_tx(
    tx: &rusqlite::Transaction<'_>,
    kind: &str,
    entity_id: Option<&str>,
    payload: serde_json::Value,
) -> anyhow::Result<i64> {
    let ts = now_ms();
    let payload_json = payload.to_string();
    tx.execute(
        "INSERT INTO event_log (ts_ms, kind, entity_id, payload_json) VALUES (?1, ?2, ?3, ?4)",
        (ts, kind, entity_id, payload_json),
    )?;
    Ok(tx.last_insert_rowid())
}

#[cfg(test)]
mod tests;
