//! [`Services`] – collaborators shared by every gate arm and array.
//!
//! All failure escalation funnels through here: a store write error or a
//! hardware queue error disables the whole gate arm system in one place.

use std::sync::Arc;

use iris_hal::GateArmPoller;
use iris_kernel::GateArmSystem;
use iris_store::{Record, Store, StoreError};
use iris_types::{ChangePublisher, EntityRef, FieldValue, GateArmError, GateArmEvent};
use tracing::{error, warn};

use crate::plan::PlanPhaseController;

#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub poller: Arc<dyn GateArmPoller>,
    pub publisher: Arc<dyn ChangePublisher>,
    pub plans: Arc<dyn PlanPhaseController>,
    pub system: Arc<GateArmSystem>,
}

impl Services {
    /// Write one field.  A failure disables the gate arm system and is
    /// returned as [`GateArmError::Persistence`].
    pub fn persist(
        &self,
        entity: &EntityRef,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), GateArmError> {
        let value = value.into();
        self.store
            .persist_field(entity, field, &value)
            .map_err(|e| self.store_failed(entity, field, &e))
    }

    /// Insert a new row.  Failure disables the system like a field write.
    pub fn insert(&self, record: &Record) -> Result<(), GateArmError> {
        let entity = record.entity();
        self.store.insert(record).map_err(|e| self.store_failed(&entity, "insert", &e))
    }

    pub fn delete(&self, entity: &EntityRef) -> Result<(), GateArmError> {
        self.store
            .delete(entity)
            .map_err(|e| self.store_failed(entity, "delete", &e))
    }

    fn store_failed(&self, entity: &EntityRef, what: &str, e: &StoreError) -> GateArmError {
        error!(%entity, what, error = %e, "store write failed");
        let reason = format!("store {what}: {e}");
        self.system.disable(&entity.name, &reason);
        GateArmError::Persistence(reason)
    }

    /// Append to the event log.  Losing an event row is logged, not fatal.
    pub fn log_event(&self, event: &GateArmEvent) {
        if let Err(e) = self.store.log_event(event) {
            warn!(entity = %event.entity, error = %e, "gate arm event not logged");
        }
    }

    pub fn publish(&self, entity: &EntityRef, attribute: &str) {
        self.publisher.publish(entity, attribute);
    }

    pub fn alert(&self, message: &str) {
        self.system.send_alert(message);
    }

    /// Escalate a hardware command failure.
    pub fn hardware_failed(&self, err: &GateArmError) {
        let name = match err {
            GateArmError::Hardware { arm, .. } => arm.as_str(),
            _ => "poller",
        };
        error!(device = name, error = %err, "hardware command failed");
        self.system.disable(name, &err.to_string());
    }
}
