//! [`GateArmRegistry`] – every arm and array, and the paths that touch more
//! than one of them.
//!
//! # Locking
//!
//! Each device sits behind its own `parking_lot::Mutex`.  No code path holds
//! two device locks at once: cross-device work first copies
//! [`ArmSnapshot`]s / [`ArraySnapshot`]s, then locks devices one at a time.
//! The map locks are held only long enough to clone `Arc` handles, and
//! sweeps are serialized by their own mutex.
//!
//! # Sweep
//!
//! 1. Arms whose comm failure outlived the timeout are forced `UNKNOWN`.
//! 2. Every arm recomputes its interlock from a snapshot of all arms.
//! 3. Every array runs the begin/check/commit transaction against a
//!    snapshot of all arrays, merging the fresh member lock states.
//! 4. Members of an array whose interlock changed get `SEND_SETTINGS`.
//!
//! Topology changes (create, destroy, slot assignment) disable the system so
//! that dependency lists are rebuilt from scratch on the next enable.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use iris_hal::HardwareEvent;
use iris_kernel::{CommHealth, CommWatchdog, OriginGuard};
use iris_store::{GateArmArrayRecord, GateArmRecord, Record};
use iris_types::{DeviceRequest, EntityRef, GateArmError, GateArmState};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::gate_arm::{ArmSnapshot, GateArm};
use crate::gate_arm_array::{ArraySnapshot, GateArmArray};
use crate::services::Services;

type ArmHandle = Arc<Mutex<GateArm>>;
type ArrayHandle = Arc<Mutex<GateArmArray>>;

/// A device found by name.
#[derive(Clone)]
pub enum Device {
    GateArm(ArmHandle),
    GateArmArray(ArrayHandle),
}

pub struct GateArmRegistry {
    svc: Services,
    origins: OriginGuard,
    arms: RwLock<BTreeMap<String, ArmHandle>>,
    arrays: RwLock<BTreeMap<String, ArrayHandle>>,
    watchdog: Mutex<CommWatchdog>,
    sweep_lock: Mutex<()>,
}

impl GateArmRegistry {
    pub fn new(svc: Services, origins: OriginGuard, comm_timeout: Duration) -> Self {
        Self {
            svc,
            origins,
            arms: RwLock::new(BTreeMap::new()),
            arrays: RwLock::new(BTreeMap::new()),
            watchdog: Mutex::new(CommWatchdog::new(comm_timeout)),
            sweep_lock: Mutex::new(()),
        }
    }

    pub fn services(&self) -> &Services {
        &self.svc
    }

    pub fn lookup(&self, name: &str) -> Option<Device> {
        if let Some(a) = self.arms.read().get(name) {
            return Some(Device::GateArm(a.clone()));
        }
        self.arrays
            .read()
            .get(name)
            .map(|a| Device::GateArmArray(a.clone()))
    }

    fn arm(&self, name: &str) -> Result<ArmHandle, GateArmError> {
        self.arms
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| GateArmError::UnknownDevice(name.to_string()))
    }

    fn array(&self, name: &str) -> Result<ArrayHandle, GateArmError> {
        self.arrays
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| GateArmError::UnknownDevice(name.to_string()))
    }

    fn arm_handles(&self) -> Vec<ArmHandle> {
        self.arms.read().values().cloned().collect()
    }

    fn array_handles(&self) -> Vec<ArrayHandle> {
        self.arrays.read().values().cloned().collect()
    }

    // ────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ────────────────────────────────────────────────────────────────────

    /// Rebuild the registry from persisted records.  Nothing is written
    /// back; inconsistent memberships are logged and skipped.
    ///
    /// Persisted states are not trusted: every arm and array starts
    /// `UNKNOWN` until its controller reports.
    pub fn load(&self, arms: Vec<GateArmRecord>, arrays: Vec<GateArmArrayRecord>) {
        let (n_arms, n_arrays) = (arms.len(), arrays.len());
        {
            let mut map = self.arrays.write();
            for rec in arrays {
                let mut ga = GateArmArray::from_record(rec);
                ga.assume_unknown();
                map.insert(ga.name().to_string(), Arc::new(Mutex::new(ga)));
            }
        }
        for rec in arms {
            if let Some(array) = rec.ga_array.as_deref() {
                match self.array(array) {
                    Ok(h) => {
                        if let Err(e) = h.lock().set_index(rec.idx, Some(&rec.name)) {
                            warn!(arm = %rec.name, array, error = %e, "membership skipped");
                        }
                    }
                    Err(_) => warn!(arm = %rec.name, array, "member of unknown array"),
                }
            }
            let mut arm = GateArm::from_record(rec);
            arm.assume_unknown();
            self.arms
                .write()
                .insert(arm.name().to_string(), Arc::new(Mutex::new(arm)));
        }
        info!(arms = n_arms, arrays = n_arrays, "gate arm registry loaded");
    }

    fn check_unused(&self, name: &str) -> Result<(), GateArmError> {
        if self.lookup(name).is_some() {
            Err(GateArmError::Veto(format!("{name} already exists")))
        } else {
            Ok(())
        }
    }

    pub fn create_array(&self, rec: GateArmArrayRecord) -> Result<(), GateArmError> {
        let name = rec.name.clone();
        self.check_unused(&name)?;
        self.svc.insert(&Record::from(rec.clone()))?;
        self.arrays
            .write()
            .insert(name.clone(), Arc::new(Mutex::new(GateArmArray::from_record(rec))));
        info!(array = %name, "gate arm array created");
        self.svc.system.disable(&name, "create");
        Ok(())
    }

    /// Create an arm, claiming its array slot when `rec.ga_array` is set.
    pub fn create_arm(&self, rec: GateArmRecord) -> Result<(), GateArmError> {
        let name = rec.name.clone();
        self.check_unused(&name)?;
        let slot = rec.ga_array.clone().map(|a| (a, rec.idx));
        if let Some((array, idx)) = &slot {
            self.array(array)?.lock().set_index(*idx, Some(&name))?;
        }
        if let Err(e) = self.svc.insert(&Record::from(rec.clone())) {
            if let Some((array, idx)) = &slot
                && let Ok(h) = self.array(array)
            {
                let _ = h.lock().set_index(*idx, None);
            }
            return Err(e);
        }
        self.arms
            .write()
            .insert(name.clone(), Arc::new(Mutex::new(GateArm::from_record(rec))));
        info!(arm = %name, "gate arm created");
        self.svc.system.disable(&name, "create");
        Ok(())
    }

    pub fn destroy_arm(&self, name: &str) -> Result<(), GateArmError> {
        let handle = self.arm(name)?;
        let (array, idx) = {
            let arm = handle.lock();
            (arm.ga_array().map(str::to_string), arm.snapshot().idx)
        };
        self.svc.delete(&EntityRef::gate_arm(name))?;
        if let Some(array) = array
            && let Ok(h) = self.array(&array)
        {
            let _ = h.lock().set_index(idx, None);
        }
        self.arms.write().remove(name);
        self.watchdog.lock().remove(name);
        info!(arm = name, "gate arm destroyed");
        self.svc.system.disable(name, "destroy");
        Ok(())
    }

    /// Destroy an array.  Vetoed while any arm is still assigned.
    pub fn destroy_array(&self, name: &str) -> Result<(), GateArmError> {
        let handle = self.array(name)?;
        if !handle.lock().members().is_empty() {
            return Err(GateArmError::Veto(format!("{name} still has gate arms")));
        }
        self.svc.delete(&EntityRef::gate_arm_array(name))?;
        self.arrays.write().remove(name);
        info!(array = name, "gate arm array destroyed");
        self.svc.system.disable(name, "destroy");
        Ok(())
    }

    /// Move an arm to slot `idx` of `array`, or out of any array with
    /// `None`.
    pub fn assign_arm(
        &self,
        arm: &str,
        array: Option<&str>,
        idx: usize,
    ) -> Result<(), GateArmError> {
        let handle = self.arm(arm)?;
        let (old_array, old_idx) = {
            let a = handle.lock();
            (a.ga_array().map(str::to_string), a.snapshot().idx)
        };
        if old_array.as_deref() == array && (array.is_none() || old_idx == idx) {
            return Ok(());
        }
        if let Some(new) = array {
            self.array(new)?.lock().set_index(idx, Some(arm))?;
        }
        if let Some(old) = &old_array
            && let Ok(h) = self.array(old)
        {
            let _ = h.lock().set_index(old_idx, None);
        }
        let idx = if array.is_some() { idx } else { 0 };
        handle
            .lock()
            .set_array(array.map(str::to_string), idx, &self.svc);
        info!(arm, array, idx, "gate arm assigned");
        self.svc.system.disable(arm, "ga_array");
        Ok(())
    }

    /// Arrays have no controller; always vetoed.
    pub fn set_array_controller(
        &self,
        array: &str,
        controller: Option<&str>,
    ) -> Result<(), GateArmError> {
        self.array(array)?.lock().set_controller(controller)
    }

    // ────────────────────────────────────────────────────────────────────
    // System
    // ────────────────────────────────────────────────────────────────────

    /// Enable the system and sweep immediately.
    pub fn enable_system(&self) -> Result<(), GateArmError> {
        self.svc.system.enable()?;
        self.sweep();
        Ok(())
    }

    pub fn disable_system(&self, name: &str, reason: &str) {
        self.svc.system.disable(name, reason);
        self.sweep();
    }

    /// A comm link was reconfigured.  Links carrying gate arms disable the
    /// system; others are ignored.
    pub fn comm_config_changed(&self, link: &str, gate_arm_protocol: bool, what: &str) {
        if gate_arm_protocol {
            self.svc
                .system
                .disable(link, &format!("comm config changed: {what}"));
        } else {
            debug!(link, what, "comm config change ignored");
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Operator requests
    // ────────────────────────────────────────────────────────────────────

    /// Claim the next request on `array`.  Returns `false` on an owner
    /// conflict.
    pub fn set_owner_next(&self, array: &str, user: Option<String>) -> Result<bool, GateArmError> {
        Ok(self.array(array)?.lock().set_owner_next(user))
    }

    /// The only way to move an array.
    #[instrument(skip(self))]
    pub fn request_state_change(
        &self,
        origin: IpAddr,
        array: &str,
        target: GateArmState,
    ) -> Result<(), GateArmError> {
        let handle = self.array(array);
        if let Err(e) = self.origins.check(origin) {
            if let Ok(h) = &handle {
                h.lock().set_owner_next(None);
            }
            return Err(e);
        }
        let handle = handle?;
        self.sweep();
        let (command, owner, members) = {
            let mut ga = handle.lock();
            let command = ga.request_state_change(target, &self.svc)?;
            (command, ga.owner().map(str::to_string), ga.members())
        };
        if let Some(target) = command {
            self.request_members(&members, target, owner.as_deref());
        }
        self.reconcile_array(array);
        Ok(())
    }

    /// Forward a validated target to every member.  Arms whose comm failure
    /// outlived the timeout are forced `UNKNOWN` instead.
    fn request_members(&self, members: &[String], target: GateArmState, owner: Option<&str>) {
        let now = Instant::now();
        for name in members {
            let Ok(handle) = self.arm(name) else {
                warn!(arm = %name, "member missing");
                continue;
            };
            let timed_out = self.watchdog.lock().health(name, now) == CommHealth::TimedOut;
            let mut arm = handle.lock();
            if timed_out {
                warn!(arm = %name, "comm timed out; request not sent");
                arm.force_unknown(&self.svc);
            } else {
                arm.request_state(target, owner, &self.svc);
            }
        }
    }

    /// Forward a maintenance request.  Arrays forward it to every member.
    pub fn request_device(&self, name: &str, req: DeviceRequest) -> Result<(), GateArmError> {
        match self.lookup(name) {
            Some(Device::GateArm(h)) => h.lock().request_device(req, &self.svc),
            Some(Device::GateArmArray(h)) => {
                let members = h.lock().members();
                for m in members {
                    if let Ok(arm) = self.arm(&m) {
                        arm.lock().request_device(req, &self.svc);
                    }
                }
            }
            None => return Err(GateArmError::UnknownDevice(name.to_string())),
        }
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────
    // Hardware events
    // ────────────────────────────────────────────────────────────────────

    /// Apply one inbound controller report.
    pub fn handle_hardware_event(&self, event: HardwareEvent) {
        let Ok(handle) = self.arm(event.arm()) else {
            debug!(arm = event.arm(), "event for unknown arm");
            return;
        };
        let array = handle.lock().ga_array().map(str::to_string);
        match event {
            HardwareEvent::ArmState { arm, state, fault } => {
                self.watchdog.lock().restore(&arm);
                let owner = array
                    .as_deref()
                    .and_then(|a| self.array(a).ok())
                    .and_then(|h| h.lock().owner().map(str::to_string));
                let mut a = handle.lock();
                a.set_comm_failed(false, &self.svc);
                a.report_hardware_state(state, fault.as_deref(), owner.as_deref(), &self.svc);
            }
            HardwareEvent::CommFailed { arm } => {
                self.watchdog.lock().fail(&arm, Instant::now());
                handle.lock().set_comm_failed(true, &self.svc);
            }
            HardwareEvent::CommRestored { arm } => {
                self.watchdog.lock().restore(&arm);
                handle.lock().set_comm_failed(false, &self.svc);
            }
            HardwareEvent::Version { version, .. } => {
                handle.lock().set_version(&version, &self.svc);
            }
        }
        if let Some(array) = array {
            self.reconcile_array(&array);
        }
    }

    fn member_snapshots(&self, members: &[String]) -> Vec<ArmSnapshot> {
        members
            .iter()
            .filter_map(|m| self.arm(m).ok())
            .map(|h| h.lock().snapshot())
            .collect()
    }

    fn reconcile_array(&self, array: &str) {
        let Ok(handle) = self.array(array) else {
            return;
        };
        let members = handle.lock().members();
        let snaps = self.member_snapshots(&members);
        handle.lock().reconcile(&snaps, &self.svc);
    }

    /// Force every arm whose comm failure outlived the timeout at `now` to
    /// `UNKNOWN`.  Returns the arms that changed state.
    pub fn expire_comm_failures(&self, now: Instant) -> Vec<String> {
        let expired = self.watchdog.lock().timed_out(now);
        let mut changed = Vec::new();
        for name in expired {
            let Ok(handle) = self.arm(&name) else {
                continue;
            };
            let (forced, array) = {
                let mut arm = handle.lock();
                (arm.force_unknown(&self.svc), arm.ga_array().map(str::to_string))
            };
            if forced {
                warn!(arm = %name, "comm failure timeout; state forced unknown");
                if let Some(array) = array {
                    self.reconcile_array(&array);
                }
                changed.push(name);
            }
        }
        changed
    }

    // ────────────────────────────────────────────────────────────────────
    // Dependency sweep
    // ────────────────────────────────────────────────────────────────────

    /// Recompute every interlock.  See the module docs for the phases.
    pub fn sweep(&self) {
        let _guard = self.sweep_lock.lock();
        let enabled = self.svc.system.is_enabled();
        self.expire_comm_failures(Instant::now());

        let arms = self.arm_handles();
        let peers = snapshot_arms(&arms);
        for h in &arms {
            h.lock().update_interlock(enabled, &peers, &self.svc);
        }

        let peers = snapshot_arms(&arms);
        let arrays = self.array_handles();
        let others: Vec<ArraySnapshot> = arrays.iter().map(|h| h.lock().snapshot()).collect();
        for h in &arrays {
            let members: Vec<ArmSnapshot> = h
                .lock()
                .members()
                .iter()
                .filter_map(|m| peers.get(m).cloned())
                .collect();
            let changed = {
                let mut ga = h.lock();
                ga.begin_dependencies(enabled && GateArmArray::is_active(&members));
                for other in &others {
                    ga.check_dependencies(other);
                }
                ga.commit_dependencies(members.iter().map(|m| m.lock), &self.svc)
            };
            if changed {
                for m in &members {
                    if let Ok(arm) = self.arm(&m.name) {
                        arm.lock()
                            .request_device(DeviceRequest::SendSettings, &self.svc);
                    }
                }
            }
        }
        debug!(arms = arms.len(), arrays = arrays.len(), enabled, "dependency sweep");
    }

    // ────────────────────────────────────────────────────────────────────
    // Views
    // ────────────────────────────────────────────────────────────────────

    pub fn arm_status(&self, name: &str) -> Option<ArmSnapshot> {
        self.arm(name).ok().map(|h| h.lock().snapshot())
    }

    pub fn array_status(&self, name: &str) -> Option<ArraySnapshot> {
        self.array(name).ok().map(|h| h.lock().snapshot())
    }

    pub fn arms(&self) -> Vec<ArmSnapshot> {
        self.arm_handles().iter().map(|h| h.lock().snapshot()).collect()
    }

    pub fn arrays(&self) -> Vec<ArraySnapshot> {
        self.array_handles()
            .iter()
            .map(|h| h.lock().snapshot())
            .collect()
    }
}

fn snapshot_arms(arms: &[ArmHandle]) -> BTreeMap<String, ArmSnapshot> {
    arms.iter()
        .map(|h| {
            let s = h.lock().snapshot();
            (s.name.clone(), s)
        })
        .collect()
}
