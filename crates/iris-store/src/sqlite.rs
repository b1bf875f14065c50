//! [`SqliteStore`] – rusqlite-backed persistence.
//!
//! Three tables are created if they do not already exist: `gate_arm`,
//! `gate_arm_array` (columns listed in [`crate::record`]) and
//! `gate_arm_event`:
//!
//! | column     | type    | description                         |
//! |------------|---------|-------------------------------------|
//! | id         | TEXT    | UUID v4 primary key                 |
//! | event_date | TEXT    | RFC-3339 timestamp (UTC)            |
//! | kind       | TEXT    | `gate_arm` or `gate_arm_array`      |
//! | device     | TEXT    | arm or array name                   |
//! | state      | INTEGER | `GateArmState` ordinal              |
//! | fault      | TEXT    | fault description                   |
//! | owner      | TEXT    | user responsible, NULL if automatic |
//!
//! # Example
//!
//! ```rust
//! use iris_store::{GateArmRecord, SqliteStore, Store};
//!
//! let store = SqliteStore::open_in_memory().unwrap();
//! store.insert(&GateArmRecord::new("ga_1").into()).unwrap();
//! assert_eq!(store.load_arms().unwrap().len(), 1);
//! ```

use chrono::{DateTime, Utc};
use iris_types::{
    EntityKind, EntityRef, FieldValue, GateArmEvent, GateArmInterlock, GateArmState, GeoLoc,
};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};
use tracing::debug;
use uuid::Uuid;

use crate::record::{GateArmArrayRecord, GateArmRecord, Record};
use crate::{Store, StoreError, check_field};

fn sql_table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::GateArm => "gate_arm",
        EntityKind::GateArmArray => "gate_arm_array",
    }
}

fn kind_from_sql(s: &str) -> Option<EntityKind> {
    match s {
        "gate_arm" => Some(EntityKind::GateArm),
        "gate_arm_array" => Some(EntityKind::GateArmArray),
        _ => None,
    }
}

fn to_sql(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(Some(s)) => Value::Text(s.clone()),
        FieldValue::Text(None) => Value::Null,
        FieldValue::Int(i) => Value::Integer(*i),
        FieldValue::Bool(b) => Value::Integer(i64::from(*b)),
    }
}

fn decode_err(name: &str, reason: impl Into<String>) -> StoreError {
    StoreError::Decode {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// SQLite-backed [`Store`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a persistent store at `path`.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a temporary in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(
            "CREATE TABLE IF NOT EXISTS gate_arm_array (
                name        TEXT NOT NULL PRIMARY KEY,
                roadway     TEXT,
                road_dir    INTEGER NOT NULL DEFAULT 0,
                notes       TEXT,
                opposing    INTEGER NOT NULL DEFAULT 0,
                prereq      TEXT,
                camera      TEXT,
                approach    TEXT,
                action_plan TEXT,
                arm_state   INTEGER NOT NULL DEFAULT 0,
                interlock   INTEGER NOT NULL DEFAULT 4
            );
            CREATE TABLE IF NOT EXISTS gate_arm (
                name        TEXT NOT NULL PRIMARY KEY,
                ga_array    TEXT,
                idx         INTEGER NOT NULL DEFAULT 0,
                roadway     TEXT,
                road_dir    INTEGER NOT NULL DEFAULT 0,
                controller  TEXT,
                pin         INTEGER NOT NULL DEFAULT 0,
                notes       TEXT,
                opposing    INTEGER NOT NULL DEFAULT 0,
                downstream  TEXT,
                camera      TEXT,
                approach    TEXT,
                arm_state   INTEGER NOT NULL DEFAULT 0,
                interlock   INTEGER NOT NULL DEFAULT 4,
                fault       TEXT,
                version     TEXT
            );
            CREATE TABLE IF NOT EXISTS gate_arm_event (
                id          TEXT NOT NULL PRIMARY KEY,
                event_date  TEXT NOT NULL,
                kind        TEXT NOT NULL,
                device      TEXT NOT NULL,
                state       INTEGER NOT NULL,
                fault       TEXT,
                owner       TEXT
            );",
        )?;
        Ok(())
    }

    /// Load every persisted gate arm, ordered by name.
    pub fn load_arms(&self) -> Result<Vec<GateArmRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT name, ga_array, idx, roadway, road_dir, controller, pin, notes,
                    opposing, downstream, camera, approach, arm_state, interlock,
                    fault, version
             FROM gate_arm ORDER BY name ASC",
        )?;
        let rows = stmt.query_map([], raw_arm)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.decode()?);
        }
        Ok(out)
    }

    /// Load every persisted gate arm array, ordered by name.
    pub fn load_arrays(&self) -> Result<Vec<GateArmArrayRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT name, roadway, road_dir, notes, opposing, prereq, camera,
                    approach, action_plan, arm_state, interlock
             FROM gate_arm_array ORDER BY name ASC",
        )?;
        let rows = stmt.query_map([], raw_array)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.decode()?);
        }
        Ok(out)
    }

    /// Event log rows for one device, oldest first.
    pub fn events(&self, device: &str) -> Result<Vec<GateArmEvent>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, event_date, kind, device, state, fault, owner
             FROM gate_arm_event WHERE device = ?1 ORDER BY event_date ASC",
        )?;
        let rows = stmt.query_map(params![device], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i32>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, date, kind, device, state, fault, owner) = row?;
            let id = Uuid::parse_str(&id).map_err(|e| decode_err(&device, e.to_string()))?;
            let timestamp = DateTime::parse_from_rfc3339(&date)
                .map_err(|e| decode_err(&device, e.to_string()))?
                .with_timezone(&Utc);
            let kind = kind_from_sql(&kind).ok_or_else(|| decode_err(&device, kind.clone()))?;
            let state = GateArmState::from_ordinal(state)
                .map_err(|e| decode_err(&device, e.to_string()))?;
            out.push(GateArmEvent {
                id,
                timestamp,
                entity: EntityRef {
                    kind,
                    name: device,
                },
                state,
                fault,
                owner,
            });
        }
        Ok(out)
    }
}

impl Store for SqliteStore {
    fn persist_field(
        &self,
        entity: &EntityRef,
        field: &str,
        value: &FieldValue,
    ) -> Result<(), StoreError> {
        check_field(entity.kind, field)?;
        let sql = format!(
            "UPDATE {} SET {field} = ?1 WHERE name = ?2",
            sql_table(entity.kind)
        );
        debug!(%entity, field, ?value, "persist field");
        let n = self
            .conn
            .lock()
            .execute(&sql, params![to_sql(value), entity.name])?;
        if n == 0 {
            return Err(StoreError::NotFound(entity.to_string()));
        }
        Ok(())
    }

    fn insert(&self, record: &Record) -> Result<(), StoreError> {
        let entity = record.entity();
        let fields = record.fields();
        let cols: Vec<&str> = fields.iter().map(|(c, _)| *c).collect();
        let marks: Vec<String> = (1..=fields.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            sql_table(entity.kind),
            cols.join(", "),
            marks.join(", ")
        );
        let conn = self.conn.lock();
        let exists: bool = conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE name = ?1)", sql_table(entity.kind)),
            params![entity.name],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::Duplicate(entity.to_string()));
        }
        conn.execute(&sql, params_from_iter(fields.iter().map(|(_, v)| to_sql(v))))?;
        Ok(())
    }

    fn delete(&self, entity: &EntityRef) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE name = ?1", sql_table(entity.kind));
        let n = self.conn.lock().execute(&sql, params![entity.name])?;
        if n == 0 {
            return Err(StoreError::NotFound(entity.to_string()));
        }
        Ok(())
    }

    fn log_event(&self, event: &GateArmEvent) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO gate_arm_event (id, event_date, kind, device, state, fault, owner)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.id.to_string(),
                event.timestamp.to_rfc3339(),
                sql_table(event.entity.kind),
                event.entity.name,
                event.state.ordinal(),
                event.fault,
                event.owner,
            ],
        )?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Row values before range checks that rusqlite cannot express.
struct RawArm {
    rec: GateArmRecord,
    idx: i64,
    road_dir: i64,
    pin: i64,
    arm_state: i32,
    interlock: i32,
}

impl RawArm {
    fn decode(mut self) -> Result<GateArmRecord, StoreError> {
        let name = self.rec.name.clone();
        self.rec.idx = usize::try_from(self.idx).map_err(|_| decode_err(&name, "idx"))?;
        self.rec.geo_loc.road_dir =
            u8::try_from(self.road_dir).map_err(|_| decode_err(&name, "road_dir"))?;
        self.rec.pin = u32::try_from(self.pin).map_err(|_| decode_err(&name, "pin"))?;
        self.rec.arm_state = GateArmState::from_ordinal(self.arm_state)
            .map_err(|e| decode_err(&name, e.to_string()))?;
        self.rec.interlock = GateArmInterlock::from_ordinal(self.interlock)
            .map_err(|e| decode_err(&name, e.to_string()))?;
        Ok(self.rec)
    }
}

fn raw_arm(row: &Row<'_>) -> rusqlite::Result<RawArm> {
    let mut rec = GateArmRecord::new(row.get::<_, String>(0)?);
    rec.ga_array = row.get(1)?;
    rec.geo_loc = GeoLoc {
        roadway: row.get(3)?,
        road_dir: 0,
    };
    rec.controller = row.get(5)?;
    rec.notes = row.get(7)?;
    rec.opposing = row.get(8)?;
    rec.downstream = row.get(9)?;
    rec.camera = row.get(10)?;
    rec.approach = row.get(11)?;
    rec.fault = row.get(14)?;
    rec.version = row.get(15)?;
    Ok(RawArm {
        rec,
        idx: row.get(2)?,
        road_dir: row.get(4)?,
        pin: row.get(6)?,
        arm_state: row.get(12)?,
        interlock: row.get(13)?,
    })
}

struct RawArray {
    rec: GateArmArrayRecord,
    road_dir: i64,
    arm_state: i32,
    interlock: i32,
}

impl RawArray {
    fn decode(mut self) -> Result<GateArmArrayRecord, StoreError> {
        let name = self.rec.name.clone();
        self.rec.geo_loc.road_dir =
            u8::try_from(self.road_dir).map_err(|_| decode_err(&name, "road_dir"))?;
        self.rec.arm_state = GateArmState::from_ordinal(self.arm_state)
            .map_err(|e| decode_err(&name, e.to_string()))?;
        self.rec.interlock = GateArmInterlock::from_ordinal(self.interlock)
            .map_err(|e| decode_err(&name, e.to_string()))?;
        Ok(self.rec)
    }
}

fn raw_array(row: &Row<'_>) -> rusqlite::Result<RawArray> {
    let mut rec = GateArmArrayRecord::new(row.get::<_, String>(0)?);
    rec.geo_loc = GeoLoc {
        roadway: row.get(1)?,
        road_dir: 0,
    };
    rec.notes = row.get(3)?;
    rec.opposing = row.get(4)?;
    rec.prereq = row.get(5)?;
    rec.camera = row.get(6)?;
    rec.approach = row.get(7)?;
    rec.action_plan = row.get(8)?;
    Ok(RawArray {
        rec,
        road_dir: row.get(2)?,
        arm_state: row.get(9)?,
        interlock: row.get(10)?,
    })
}
