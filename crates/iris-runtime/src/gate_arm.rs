//! [`GateArm`] – one physical barrier arm.
//!
//! A `GateArm` owns its hardware-reported state and its own interlock.  It
//! never locks another device: peer states arrive as an [`ArmSnapshot`] map
//! taken by the registry at the start of a sweep.
//!
//! # Conflicts
//!
//! `open_conflict` is raised when policy denies opening while the arm may
//! be open; `close_conflict` when policy denies closing while the arm is
//! closed.  Alerts fire on the rising edge only.  A new arm starts with
//! `open_conflict = true` so that a conflict present from the start never
//! alerts until it has cleared once.

use std::collections::BTreeMap;

use iris_hal::ArmTarget;
use iris_kernel::LockState;
use iris_store::GateArmRecord;
use iris_types::{
    DeviceRequest, EntityRef, FieldValue, GateArmEvent, GateArmInterlock, GateArmState, GeoLoc,
    ItemStyles, trim_fault,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dependency::Dependencies;
use crate::services::Services;

/// Point-in-time copy of an arm, safe to read without the arm's lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArmSnapshot {
    pub name: String,
    pub ga_array: Option<String>,
    pub idx: usize,
    pub active: bool,
    pub failed: bool,
    pub state: GateArmState,
    pub interlock: GateArmInterlock,
    pub fault: Option<String>,
    pub version: Option<String>,
    pub styles: ItemStyles,
    pub geo_loc: GeoLoc,
    pub notes: Option<String>,
    pub opposing: bool,
    pub downstream: Option<String>,
    pub open_conflict: bool,
    pub close_conflict: bool,
    #[serde(skip)]
    pub lock: LockState,
}

pub struct GateArm {
    name: String,
    entity: EntityRef,
    ga_array: Option<String>,
    idx: usize,
    geo_loc: GeoLoc,
    controller: Option<String>,
    pin: u32,
    notes: Option<String>,
    opposing: bool,
    downstream: Option<String>,
    camera: Option<String>,
    approach: Option<String>,
    arm_state: GateArmState,
    interlock: GateArmInterlock,
    fault: Option<String>,
    version: Option<String>,
    styles: ItemStyles,
    comm_failed: bool,
    deps: Dependencies,
    lock: LockState,
    open_conflict: bool,
    close_conflict: bool,
}

impl GateArm {
    /// Build an arm from its persisted record.  Transient state starts
    /// fail-safe: `SYSTEM_DISABLE`, empty dependency lists, open conflict.
    pub fn from_record(rec: GateArmRecord) -> Self {
        let mut arm = Self {
            entity: EntityRef::gate_arm(rec.name.clone()),
            name: rec.name,
            ga_array: rec.ga_array,
            idx: rec.idx,
            geo_loc: rec.geo_loc,
            controller: rec.controller,
            pin: rec.pin,
            notes: rec.notes,
            opposing: rec.opposing,
            downstream: rec.downstream,
            camera: rec.camera,
            approach: rec.approach,
            arm_state: rec.arm_state,
            interlock: GateArmInterlock::SystemDisable,
            fault: trim_fault(rec.fault.as_deref()),
            version: rec.version,
            styles: ItemStyles::default(),
            comm_failed: false,
            deps: Dependencies::default(),
            lock: LockState::new(false),
            open_conflict: true,
            close_conflict: false,
        };
        arm.styles = arm.compute_styles();
        arm
    }

    pub fn to_record(&self) -> GateArmRecord {
        GateArmRecord {
            name: self.name.clone(),
            ga_array: self.ga_array.clone(),
            idx: self.idx,
            geo_loc: self.geo_loc.clone(),
            controller: self.controller.clone(),
            pin: self.pin,
            notes: self.notes.clone(),
            opposing: self.opposing,
            downstream: self.downstream.clone(),
            camera: self.camera.clone(),
            approach: self.approach.clone(),
            arm_state: self.arm_state,
            interlock: self.interlock,
            fault: self.fault.clone(),
            version: self.version.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ga_array(&self) -> Option<&str> {
        self.ga_array.as_deref()
    }

    pub fn arm_state(&self) -> GateArmState {
        self.arm_state
    }

    pub fn interlock(&self) -> GateArmInterlock {
        self.interlock
    }

    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    pub fn camera(&self) -> Option<&str> {
        self.camera.as_deref()
    }

    pub fn approach(&self) -> Option<&str> {
        self.approach.as_deref()
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.deps
    }

    pub fn lock_state(&self) -> LockState {
        self.lock
    }

    pub fn open_conflict(&self) -> bool {
        self.open_conflict
    }

    pub fn close_conflict(&self) -> bool {
        self.close_conflict
    }

    /// An arm is active once it is bound to a controller.
    pub fn is_active(&self) -> bool {
        self.controller.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.comm_failed
    }

    pub fn target(&self) -> ArmTarget {
        ArmTarget {
            name: self.name.clone(),
            controller: self.controller.clone(),
            pin: self.pin,
        }
    }

    pub fn snapshot(&self) -> ArmSnapshot {
        ArmSnapshot {
            name: self.name.clone(),
            ga_array: self.ga_array.clone(),
            idx: self.idx,
            active: self.is_active(),
            failed: self.comm_failed,
            state: self.arm_state,
            interlock: self.interlock,
            fault: self.fault.clone(),
            version: self.version.clone(),
            styles: self.styles,
            geo_loc: self.geo_loc.clone(),
            notes: self.notes.clone(),
            opposing: self.opposing,
            downstream: self.downstream.clone(),
            open_conflict: self.open_conflict,
            close_conflict: self.close_conflict,
            lock: self.lock,
        }
    }

    /// Drop the persisted state after a restart.  Nothing is written; the
    /// next controller report sets the real state.
    pub(crate) fn assume_unknown(&mut self) {
        self.arm_state = GateArmState::Unknown;
        self.styles = self.compute_styles();
    }

    /// Record membership in an array slot.
    pub(crate) fn set_array(&mut self, array: Option<String>, idx: usize, svc: &Services) {
        let _ = svc.persist(&self.entity, "ga_array", array.clone());
        let _ = svc.persist(
            &self.entity,
            "idx",
            FieldValue::Int(i64::try_from(idx).unwrap_or(0)),
        );
        self.ga_array = array;
        self.idx = idx;
    }

    // ────────────────────────────────────────────────────────────────────
    // Requests
    // ────────────────────────────────────────────────────────────────────

    /// Dispatch an open or close command when the interlock permits it.
    ///
    /// Denied or unsupported targets are a silent no-op at this layer.
    /// Returns `true` when a command was queued.
    pub fn request_state(&mut self, target: GateArmState, user: Option<&str>, svc: &Services) -> bool {
        let arm = self.target();
        let sent = match target {
            GateArmState::Opening if self.interlock.is_open_allowed() => {
                svc.poller.send_open(&arm, user)
            }
            GateArmState::Closing if self.interlock.is_close_allowed() => {
                svc.poller.send_close(&arm, user)
            }
            _ => {
                debug!(arm = %self.name, %target, interlock = %self.interlock, "arm request ignored");
                return false;
            }
        };
        match sent {
            Ok(()) => {
                info!(arm = %self.name, %target, user, "arm command sent");
                true
            }
            Err(e) => {
                svc.hardware_failed(&e);
                false
            }
        }
    }

    /// Forward a maintenance request.  Only gate arm requests are accepted,
    /// and nothing is sent while gate arm configuration is disabled.
    pub fn request_device(&mut self, req: DeviceRequest, svc: &Services) {
        if !req.is_gate_arm_request() {
            debug!(arm = %self.name, ?req, "device request not supported");
            return;
        }
        if !svc.system.is_config_enabled() {
            warn!(arm = %self.name, ?req, "device request dropped: configuration disabled");
            return;
        }
        if let Err(e) = svc.poller.send_request(&self.target(), req) {
            svc.hardware_failed(&e);
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Hardware reports
    // ────────────────────────────────────────────────────────────────────

    /// Apply a state reported by the controller.  Returns `true` when the
    /// arm state changed.
    pub fn report_hardware_state(
        &mut self,
        state: GateArmState,
        fault: Option<&str>,
        owner: Option<&str>,
        svc: &Services,
    ) -> bool {
        let fault = trim_fault(fault);
        if fault != self.fault {
            let _ = svc.persist(&self.entity, "fault", fault.clone());
            self.fault = fault.clone();
            svc.publish(&self.entity, "fault");
        }
        let changed = state != self.arm_state;
        if changed {
            let _ = svc.persist(&self.entity, "arm_state", state);
            info!(arm = %self.name, from = %self.arm_state, to = %state, "arm state");
            self.arm_state = state;
            svc.log_event(&GateArmEvent::new(
                self.entity.clone(),
                state,
                fault.clone(),
                owner.map(str::to_string),
            ));
            if state.is_unsafe() {
                let msg = match &fault {
                    Some(f) => format!("GATE ARM {state}: {}: {f}", self.name),
                    None => format!("GATE ARM {state}: {}", self.name),
                };
                svc.alert(&msg);
            }
            svc.publish(&self.entity, "armState");
        }
        self.update_styles(svc);
        changed
    }

    /// Force `UNKNOWN` after communication has been lost for too long.
    pub fn force_unknown(&mut self, svc: &Services) -> bool {
        self.report_hardware_state(GateArmState::Unknown, None, None, svc)
    }

    pub fn set_comm_failed(&mut self, failed: bool, svc: &Services) {
        if failed != self.comm_failed {
            if failed {
                warn!(arm = %self.name, "arm communication failed");
            } else {
                info!(arm = %self.name, "arm communication restored");
            }
            self.comm_failed = failed;
            self.update_styles(svc);
        }
    }

    pub fn set_version(&mut self, version: &str, svc: &Services) {
        if self.version.as_deref() != Some(version) {
            let _ = svc.persist(&self.entity, "version", Some(version.to_string()));
            self.version = Some(version.to_string());
            svc.publish(&self.entity, "version");
        }
    }

    fn compute_styles(&self) -> ItemStyles {
        let mut s = ItemStyles::ALL;
        if self.controller.is_none() {
            s.insert(ItemStyles::NO_CONTROLLER);
        }
        if !self.is_active() {
            s.insert(ItemStyles::INACTIVE);
            return s;
        }
        if self.comm_failed {
            s.insert(ItemStyles::FAILED);
        }
        match self.arm_state {
            GateArmState::Closed => s.insert(ItemStyles::CLOSED),
            GateArmState::Open | GateArmState::WarnClose => s.insert(ItemStyles::OPEN),
            GateArmState::Opening | GateArmState::Closing => s.insert(ItemStyles::MOVING),
            GateArmState::Fault => s.insert(ItemStyles::MAINTENANCE),
            GateArmState::Unknown => {}
        }
        s
    }

    fn update_styles(&mut self, svc: &Services) {
        let styles = self.compute_styles();
        if styles != self.styles {
            self.styles = styles;
            svc.publish(&self.entity, "styles");
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Interlock
    // ────────────────────────────────────────────────────────────────────

    /// Rebuild the dependency lists from a snapshot of every arm.
    pub fn init_dependencies(&mut self, peers: &BTreeMap<String, ArmSnapshot>) {
        self.deps = Dependencies::build(&self.snapshot(), peers.values());
        debug!(arm = %self.name, deps = ?self.deps, "dependencies rebuilt");
    }

    /// Recompute this arm's interlock from its neighbours.
    ///
    /// Leaving `SYSTEM_DISABLE` rebuilds the dependency lists first; entering
    /// it clears them.  Neighbours missing from `peers` count as unsafe.
    pub fn update_interlock(
        &mut self,
        system_enabled: bool,
        peers: &BTreeMap<String, ArmSnapshot>,
        svc: &Services,
    ) {
        if system_enabled && self.interlock == GateArmInterlock::SystemDisable {
            self.init_dependencies(peers);
        }
        let mut lock = LockState::new(system_enabled);
        let state_of = |n: &String| peers.get(n).map(|p| p.state);
        if self
            .deps
            .opposing
            .iter()
            .any(|n| state_of(n).is_none_or(GateArmState::is_possibly_open))
        {
            lock.raise_opposing_open();
        }
        if self
            .deps
            .downstream
            .iter()
            .any(|n| state_of(n).is_none_or(GateArmState::is_possibly_closed))
        {
            lock.raise_downstream_closed();
        }
        if self
            .deps
            .upstream
            .iter()
            .any(|n| state_of(n).is_none_or(GateArmState::is_possibly_open))
        {
            lock.raise_upstream_open();
        }
        self.lock = lock;
        let interlock = lock.interlock();
        if interlock != self.interlock {
            self.set_interlock(interlock, svc);
        }
        if interlock == GateArmInterlock::SystemDisable {
            self.deps.clear();
        }
        self.update_conflicts(svc);
    }

    fn set_interlock(&mut self, interlock: GateArmInterlock, svc: &Services) {
        info!(arm = %self.name, from = %self.interlock, to = %interlock, "arm interlock");
        let _ = svc.persist(&self.entity, "interlock", interlock);
        self.interlock = interlock;
        if self.is_active()
            && let Err(e) = svc.poller.send_interlock_advisory(&self.target(), interlock)
        {
            svc.hardware_failed(&e);
        }
        svc.publish(&self.entity, "interlock");
    }

    fn update_conflicts(&mut self, svc: &Services) {
        let open = self.lock.is_open_denied() && self.arm_state.is_possibly_open();
        if open && !self.open_conflict {
            warn!(arm = %self.name, state = %self.arm_state, "open conflict");
            svc.alert(&format!("OPEN CONFLICT: {}", self.name));
        }
        self.open_conflict = open;

        let close = self.lock.is_close_denied() && self.arm_state == GateArmState::Closed;
        if close && !self.close_conflict {
            warn!(arm = %self.name, "close conflict");
            svc.alert(&format!("CLOSE CONFLICT: {}", self.name));
        }
        self.close_conflict = close;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::testing::Harness;

    pub(crate) fn record(name: &str) -> GateArmRecord {
        let mut rec = GateArmRecord::new(name);
        rec.controller = Some(format!("ctl_{name}"));
        rec.pin = 1;
        rec
    }

    #[test]
    fn new_arm_starts_fail_safe() {
        let arm = GateArm::from_record(record("ga_1"));
        assert!(arm.open_conflict());
        assert!(!arm.close_conflict());
        assert_eq!(arm.interlock(), GateArmInterlock::SystemDisable);
        assert!(arm.dependencies().is_empty());
    }

    #[test]
    fn request_respects_interlock() {
        let h = Harness::new();
        let mut arm = h.arm(record("ga_1"));
        // SYSTEM_DISABLE denies both directions.
        assert!(!arm.request_state(GateArmState::Opening, Some("op"), &h.svc));
        assert!(!arm.request_state(GateArmState::Closing, Some("op"), &h.svc));

        h.enable();
        arm.update_interlock(true, &BTreeMap::new(), &h.svc);
        assert_eq!(arm.interlock(), GateArmInterlock::None);
        assert!(arm.request_state(GateArmState::Opening, Some("op"), &h.svc));
        assert!(!arm.request_state(GateArmState::WarnClose, Some("op"), &h.svc));
        assert_eq!(h.poller.movement_count(), 1);
    }

    #[test]
    fn poller_failure_disables_system() {
        let h = Harness::new();
        h.enable();
        let mut arm = h.arm(record("ga_1"));
        arm.update_interlock(true, &BTreeMap::new(), &h.svc);
        h.poller.set_offline(true);
        assert!(!arm.request_state(GateArmState::Closing, None, &h.svc));
        assert!(!h.system.is_enabled());
    }

    #[test]
    fn fault_report_alerts_and_trims() {
        let h = Harness::new();
        let mut arm = h.arm(record("ga_1"));
        let long = format!("  {}  ", "m".repeat(50));
        assert!(arm.report_hardware_state(GateArmState::Fault, Some(&long), None, &h.svc));
        assert_eq!(arm.fault().map(str::len), Some(32));
        assert_eq!(h.alerts.count_containing("GATE ARM FAULT: ga_1"), 1);

        // Same state again: no new alert, no new event.
        assert!(!arm.report_hardware_state(GateArmState::Fault, Some(&long), None, &h.svc));
        assert_eq!(h.alerts.count_containing("GATE ARM FAULT"), 1);
        assert_eq!(h.store.events().len(), 1);
    }

    #[test]
    fn state_report_updates_styles() {
        let h = Harness::new();
        let mut arm = h.arm(record("ga_1"));
        arm.report_hardware_state(GateArmState::Closing, None, None, &h.svc);
        assert!(arm.snapshot().styles.contains(ItemStyles::MOVING));
        arm.report_hardware_state(GateArmState::Closed, None, None, &h.svc);
        let styles = arm.snapshot().styles;
        assert!(styles.contains(ItemStyles::CLOSED));
        assert!(!styles.contains(ItemStyles::MOVING));
        assert!(h.publisher.count("ga_1", "styles") >= 2);
    }

    #[test]
    fn unbound_arm_is_inactive() {
        let arm = GateArm::from_record(GateArmRecord::new("ga_x"));
        let snap = arm.snapshot();
        assert!(!snap.active);
        assert!(snap.styles.contains(ItemStyles::NO_CONTROLLER));
        assert!(snap.styles.contains(ItemStyles::INACTIVE));
    }

    #[test]
    fn missing_neighbour_is_unsafe() {
        let h = Harness::new();
        h.enable();
        let mut nb = record("nb");
        nb.opposing = true;
        nb.geo_loc = GeoLoc::new("I-35W", 1);
        let mut sb = record("sb");
        sb.opposing = true;
        sb.geo_loc = GeoLoc::new("I-35W", 2);
        sb.arm_state = GateArmState::Closed;
        let mut arm = h.arm(nb);
        let sb = GateArm::from_record(sb);

        let mut peers = BTreeMap::new();
        peers.insert("sb".to_string(), sb.snapshot());
        arm.update_interlock(true, &peers, &h.svc);
        assert_eq!(arm.interlock(), GateArmInterlock::None);

        peers.clear();
        arm.update_interlock(true, &peers, &h.svc);
        assert_eq!(arm.interlock(), GateArmInterlock::DenyOpen);
    }

    #[test]
    fn entering_system_disable_clears_dependencies() {
        let h = Harness::new();
        h.enable();
        let mut a = record("a");
        a.downstream = Some("#next".to_string());
        let mut b = record("b");
        b.notes = Some("#next".to_string());
        b.arm_state = GateArmState::Open;
        let mut arm = h.arm(a);
        let mut peers = BTreeMap::new();
        peers.insert("b".to_string(), GateArm::from_record(b).snapshot());

        arm.update_interlock(true, &peers, &h.svc);
        assert_eq!(arm.dependencies().downstream, vec!["b".to_string()]);

        arm.update_interlock(false, &peers, &h.svc);
        assert_eq!(arm.interlock(), GateArmInterlock::SystemDisable);
        assert!(arm.dependencies().is_empty());
    }

    #[test]
    fn interlock_change_sends_advisory_and_persists() {
        let h = Harness::new();
        h.enable();
        let mut arm = h.arm(record("ga_1"));
        arm.update_interlock(true, &BTreeMap::new(), &h.svc);
        assert!(h.poller.sent().iter().any(|c| matches!(
            c,
            iris_hal::HardwareCommand::InterlockAdvisory { interlock: GateArmInterlock::None, .. }
        )));
        assert_eq!(
            h.store.field(&EntityRef::gate_arm("ga_1"), "interlock"),
            Some(GateArmInterlock::None.into())
        );
        assert_eq!(h.publisher.count("ga_1", "interlock"), 1);
    }

    #[test]
    fn conflict_alerts_on_rising_edge_only() {
        let h = Harness::new();
        h.enable();
        let mut up = record("up");
        up.downstream = Some("#down".to_string());
        up.arm_state = GateArmState::Open;
        let mut down = record("down");
        down.notes = Some("#down".to_string());
        down.arm_state = GateArmState::Closed;
        let mut arm = h.arm(down);
        let mut peers = BTreeMap::new();
        peers.insert("up".to_string(), GateArm::from_record(up).snapshot());

        // Upstream open denies closing; the arm is closed => close conflict.
        arm.update_interlock(true, &peers, &h.svc);
        assert_eq!(arm.interlock(), GateArmInterlock::DenyClose);
        assert!(arm.close_conflict());
        arm.update_interlock(true, &peers, &h.svc);
        assert_eq!(h.alerts.count_containing("CLOSE CONFLICT: down"), 1);
    }

    #[test]
    fn device_requests_are_filtered() {
        let h = Harness::new();
        let mut arm = GateArm::from_record(record("ga_1"));
        arm.request_device(DeviceRequest::QueryConfiguration, &h.svc);
        arm.request_device(DeviceRequest::QueryStatus, &h.svc);
        assert_eq!(h.poller.sent().len(), 1);
    }
}
