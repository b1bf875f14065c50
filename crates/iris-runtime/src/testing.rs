//! In-process test doubles.
//!
//! [`Harness`] wires a [`Services`] bundle to a [`MemoryStore`], a
//! [`SimPoller`], [`StaticPlans`] and recording alert/publish sinks so the
//! engine can run without hardware or a database.

use std::sync::Arc;
use std::time::Duration;

use iris_hal::SimPoller;
use iris_kernel::{GateArmSystem, OriginGuard};
use iris_store::{GateArmArrayRecord, GateArmRecord, MemoryStore, Record, Store};
use iris_types::{AlertSink, ChangePublisher, EntityRef};
use parking_lot::Mutex;

use crate::gate_arm::GateArm;
use crate::gate_arm_array::GateArmArray;
use crate::plan::StaticPlans;
use crate::registry::GateArmRegistry;
use crate::services::Services;

/// Alert sink that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingAlerts {
    messages: Mutex<Vec<String>>,
}

impl RecordingAlerts {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.contains(needle))
            .count()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl AlertSink for RecordingAlerts {
    fn send_alert(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

/// Change publisher that keeps every `(entity, attribute)` pair.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    changes: Mutex<Vec<(EntityRef, String)>>,
}

impl RecordingPublisher {
    /// Number of publications of `attribute` on the entity called `name`.
    pub fn count(&self, name: &str, attribute: &str) -> usize {
        self.changes
            .lock()
            .iter()
            .filter(|(e, a)| e.name == name && a == attribute)
            .count()
    }
}

impl ChangePublisher for RecordingPublisher {
    fn publish(&self, entity: &EntityRef, attribute: &str) {
        self.changes
            .lock()
            .push((entity.clone(), attribute.to_string()));
    }
}

pub struct Harness {
    pub svc: Services,
    pub store: Arc<MemoryStore>,
    pub poller: Arc<SimPoller>,
    pub alerts: Arc<RecordingAlerts>,
    pub publisher: Arc<RecordingPublisher>,
    pub plans: Arc<StaticPlans>,
    pub system: Arc<GateArmSystem>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_plans(StaticPlans::new())
    }

    pub fn with_plans(plans: StaticPlans) -> Self {
        let store = Arc::new(MemoryStore::new());
        let poller = Arc::new(SimPoller::new());
        let alerts = Arc::new(RecordingAlerts::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let plans = Arc::new(plans);
        let system = Arc::new(GateArmSystem::new(None, alerts.clone()));
        let svc = Services {
            store: store.clone(),
            poller: poller.clone(),
            publisher: publisher.clone(),
            plans: plans.clone(),
            system: system.clone(),
        };
        Self {
            svc,
            store,
            poller,
            alerts,
            publisher,
            plans,
            system,
        }
    }

    /// Enable the system.  Without an enable file this cannot fail.
    pub fn enable(&self) {
        let _ = self.system.enable();
    }

    /// Store `rec` and build a standalone arm from it.
    pub fn arm(&self, rec: GateArmRecord) -> GateArm {
        let _ = self.store.insert(&Record::from(rec.clone()));
        GateArm::from_record(rec)
    }

    /// Store `rec` and build a standalone array from it.
    pub fn array(&self, rec: GateArmArrayRecord) -> GateArmArray {
        let _ = self.store.insert(&Record::from(rec.clone()));
        GateArmArray::from_record(rec)
    }

    /// Registry accepting requests from loopback with a 30 second comm
    /// timeout.
    pub fn registry(&self) -> GateArmRegistry {
        self.registry_with_timeout(Duration::from_secs(30))
    }

    pub fn registry_with_timeout(&self, comm_timeout: Duration) -> GateArmRegistry {
        let mut origins = OriginGuard::new();
        let _ = origins.allow("127.0.0.0/8");
        let _ = origins.allow("::1/128");
        GateArmRegistry::new(self.svc.clone(), origins, comm_timeout)
    }
}
