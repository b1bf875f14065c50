//! `iris-store` – persistence boundary for gate arms and arrays.
//!
//! The runtime writes through the [`Store`] trait one field at a time.  A
//! failed write is never retried: the caller converts it into a system
//! disable.
//!
//! # Modules
//!
//! - [`record`] – [`GateArmRecord`][record::GateArmRecord] and
//!   [`GateArmArrayRecord`][record::GateArmArrayRecord], the persisted
//!   column sets, plus the per-table column whitelist.
//! - [`memory`] – [`MemoryStore`][memory::MemoryStore]: in-process store
//!   with write-failure injection for tests.
//! - [`sqlite`] – [`SqliteStore`][sqlite::SqliteStore]: rusqlite-backed
//!   store with record loading for startup.

pub mod memory;
pub mod record;
pub mod sqlite;

use iris_types::{EntityKind, EntityRef, FieldValue, GateArmEvent};
use thiserror::Error;

pub use memory::MemoryStore;
pub use record::{GateArmArrayRecord, GateArmRecord, Record};
pub use sqlite::SqliteStore;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Unknown column {field} in {table}")]
    UnknownField { table: &'static str, field: String },
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Record already exists: {0}")]
    Duplicate(String),
    #[error("Corrupt record {name}: {reason}")]
    Decode { name: String, reason: String },
    #[error("Write failed: {0}")]
    WriteFailed(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Store trait
// ─────────────────────────────────────────────────────────────────────────────

/// Persistence boundary used by the runtime.
pub trait Store: Send + Sync {
    /// Atomically update a single column of one entity.
    fn persist_field(
        &self,
        entity: &EntityRef,
        field: &str,
        value: &FieldValue,
    ) -> Result<(), StoreError>;

    /// Insert a newly created entity.
    fn insert(&self, record: &Record) -> Result<(), StoreError>;

    /// Remove a destroyed entity.
    fn delete(&self, entity: &EntityRef) -> Result<(), StoreError>;

    /// Append a row to the gate arm event log.
    fn log_event(&self, event: &GateArmEvent) -> Result<(), StoreError>;
}

/// Reject column names outside the table's whitelist.
pub(crate) fn check_field(kind: EntityKind, field: &str) -> Result<(), StoreError> {
    if record::columns(kind).contains(&field) {
        Ok(())
    } else {
        Err(StoreError::UnknownField {
            table: kind.table(),
            field: field.to_string(),
        })
    }
}
