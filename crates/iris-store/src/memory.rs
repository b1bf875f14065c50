//! [`MemoryStore`] – in-process store for tests and headless runs.
//!
//! Rows are kept as column maps keyed by [`EntityRef`].  Write failures can
//! be injected with [`MemoryStore::set_fail_writes`] to exercise the
//! fail-closed path.

use std::collections::{BTreeMap, HashMap};

use iris_types::{EntityRef, FieldValue, GateArmEvent};
use parking_lot::Mutex;
use tracing::debug;

use crate::record::Record;
use crate::{Store, StoreError, check_field};

type Row = BTreeMap<String, FieldValue>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<EntityRef, Row>>,
    events: Mutex<Vec<GateArmEvent>>,
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every write fails with [`StoreError::WriteFailed`].
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    /// Current value of one column.
    pub fn field(&self, entity: &EntityRef, field: &str) -> Option<FieldValue> {
        self.rows.lock().get(entity)?.get(field).cloned()
    }

    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.rows.lock().contains_key(entity)
    }

    /// Logged events, oldest first.
    pub fn events(&self) -> Vec<GateArmEvent> {
        self.events.lock().clone()
    }

    fn check_writable(&self, what: &str) -> Result<(), StoreError> {
        if *self.fail_writes.lock() {
            Err(StoreError::WriteFailed(what.to_string()))
        } else {
            Ok(())
        }
    }
}

impl Store for MemoryStore {
    fn persist_field(
        &self,
        entity: &EntityRef,
        field: &str,
        value: &FieldValue,
    ) -> Result<(), StoreError> {
        check_field(entity.kind, field)?;
        self.check_writable(&format!("{entity}.{field}"))?;
        let mut rows = self.rows.lock();
        let row = rows
            .get_mut(entity)
            .ok_or_else(|| StoreError::NotFound(entity.to_string()))?;
        debug!(%entity, field, ?value, "persist field");
        row.insert(field.to_string(), value.clone());
        Ok(())
    }

    fn insert(&self, record: &Record) -> Result<(), StoreError> {
        let entity = record.entity();
        self.check_writable(&entity.to_string())?;
        let mut rows = self.rows.lock();
        if rows.contains_key(&entity) {
            return Err(StoreError::Duplicate(entity.to_string()));
        }
        let row = record
            .fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        rows.insert(entity, row);
        Ok(())
    }

    fn delete(&self, entity: &EntityRef) -> Result<(), StoreError> {
        self.check_writable(&entity.to_string())?;
        self.rows
            .lock()
            .remove(entity)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(entity.to_string()))
    }

    fn log_event(&self, event: &GateArmEvent) -> Result<(), StoreError> {
        self.check_writable("gate_arm_event")?;
        self.events.lock().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::GateArmRecord;
    use iris_types::GateArmState;

    fn store_with_arm() -> (MemoryStore, EntityRef) {
        let store = MemoryStore::new();
        store.insert(&GateArmRecord::new("ga_1").into()).unwrap();
        (store, EntityRef::gate_arm("ga_1"))
    }

    #[test]
    fn persist_updates_column() {
        let (store, ga) = store_with_arm();
        store
            .persist_field(&ga, "arm_state", &GateArmState::Open.into())
            .unwrap();
        assert_eq!(
            store.field(&ga, "arm_state"),
            Some(FieldValue::Int(i64::from(GateArmState::Open.ordinal())))
        );
    }

    #[test]
    fn unknown_column_is_rejected() {
        let (store, ga) = store_with_arm();
        let err = store
            .persist_field(&ga, "prereq", &FieldValue::Text(None))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownField { .. }));
    }

    #[test]
    fn injected_failure_blocks_writes() {
        let (store, ga) = store_with_arm();
        store.set_fail_writes(true);
        assert!(matches!(
            store.persist_field(&ga, "fault", &FieldValue::Text(None)),
            Err(StoreError::WriteFailed(_))
        ));
        store.set_fail_writes(false);
        assert!(store.persist_field(&ga, "fault", &FieldValue::Text(None)).is_ok());
    }

    #[test]
    fn duplicate_insert_and_missing_delete() {
        let (store, ga) = store_with_arm();
        assert!(matches!(
            store.insert(&GateArmRecord::new("ga_1").into()),
            Err(StoreError::Duplicate(_))
        ));
        store.delete(&ga).unwrap();
        assert!(!store.contains(&ga));
        assert!(matches!(store.delete(&ga), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn events_are_appended() {
        let store = MemoryStore::new();
        let ev = GateArmEvent::new(EntityRef::gate_arm("ga_1"), GateArmState::Fault, None, None);
        store.log_event(&ev).unwrap();
        assert_eq!(store.events().len(), 1);
    }
}
