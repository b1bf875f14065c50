//! [`GateArmArray`] – the unit operators command.
//!
//! An array groups up to [`MAX_ARMS`] arms at one ramp.  Its state is the
//! aggregate of its active members (see [`aggregate`]), except that an
//! operator's `WARN_CLOSE` is held until the members actually start
//! closing.
//!
//! # Single-writer protocol
//!
//! A client claims the array with [`GateArmArray::set_owner_next`] and then
//! submits a target with [`GateArmArray::request_state_change`].  The claim
//! is consumed by the request whether or not it succeeds.  A second claim
//! while one is pending clears the slot and counts a conflict; the losing
//! request then proceeds without owner attribution.
//!
//! # Transitions accepted from operators
//!
//! | Target | Legal from | Interlock |
//! |---|---|---|
//! | `OPENING` | `CLOSED`, `WARN_CLOSE` | open allowed |
//! | `WARN_CLOSE` | `OPEN` | close allowed (becomes `CLOSING` when the plan has no signs) |
//! | `CLOSING` | `OPEN`, `WARN_CLOSE` | close allowed |
//!
//! Everything else, including any exit from `UNKNOWN` or `FAULT`, is an
//! invalid transition.

use iris_kernel::LockState;
use iris_store::GateArmArrayRecord;
use iris_types::{
    EntityRef, GateArmError, GateArmEvent, GateArmInterlock, GateArmState, GeoLoc, ItemStyles,
    MAX_ARMS,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::gate_arm::ArmSnapshot;
use crate::plan::{PHASE_CLOSED, PHASE_OPEN};
use crate::services::Services;

/// Point-in-time copy of an array, safe to read without the array's lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArraySnapshot {
    pub name: String,
    pub geo_loc: GeoLoc,
    pub opposing: bool,
    pub prereq: Option<String>,
    pub action_plan: Option<String>,
    pub state: GateArmState,
    pub interlock: GateArmInterlock,
    /// Member arm names in slot order.
    pub members: Vec<String>,
    pub owner: Option<String>,
    pub owner_conflicts: u32,
    pub open_conflict: bool,
    pub close_conflict: bool,
    pub styles: ItemStyles,
}

/// Fold active member states into one array state.
///
/// No members at all is `UNKNOWN`.  `WARN_CLOSE` members count as open.
pub fn aggregate(states: impl IntoIterator<Item = GateArmState>) -> GateArmState {
    let (mut any, mut unknown, mut fault) = (false, false, false);
    let (mut opening, mut closing, mut open, mut closed) = (false, false, false, false);
    for s in states {
        any = true;
        match s {
            GateArmState::Unknown => unknown = true,
            GateArmState::Fault => fault = true,
            GateArmState::Opening => opening = true,
            GateArmState::Closing => closing = true,
            GateArmState::Open | GateArmState::WarnClose => open = true,
            GateArmState::Closed => closed = true,
        }
    }
    if !any || unknown {
        GateArmState::Unknown
    } else if fault {
        GateArmState::Fault
    } else if opening && !closing {
        GateArmState::Opening
    } else if closing && !opening {
        GateArmState::Closing
    } else if opening || closing {
        GateArmState::Fault
    } else if open && !closed {
        GateArmState::Open
    } else if closed && !open {
        GateArmState::Closed
    } else {
        GateArmState::Fault
    }
}

pub struct GateArmArray {
    name: String,
    entity: EntityRef,
    geo_loc: GeoLoc,
    notes: Option<String>,
    opposing: bool,
    prereq: Option<String>,
    camera: Option<String>,
    approach: Option<String>,
    action_plan: Option<String>,
    arms: [Option<String>; MAX_ARMS],
    arm_state: GateArmState,
    interlock: GateArmInterlock,
    owner: Option<String>,
    owner_next: Option<String>,
    owner_conflicts: u32,
    lock: LockState,
    prereq_seen: bool,
    open_conflict: bool,
    close_conflict: bool,
    styles: ItemStyles,
    /// Open/closed status last sent to the action plan.
    plan_open: bool,
}

impl GateArmArray {
    pub fn from_record(rec: GateArmArrayRecord) -> Self {
        Self {
            entity: EntityRef::gate_arm_array(rec.name.clone()),
            name: rec.name,
            geo_loc: rec.geo_loc,
            notes: rec.notes,
            opposing: rec.opposing,
            prereq: rec.prereq,
            camera: rec.camera,
            approach: rec.approach,
            action_plan: rec.action_plan,
            arms: Default::default(),
            plan_open: rec.arm_state == GateArmState::Open,
            arm_state: rec.arm_state,
            interlock: GateArmInterlock::SystemDisable,
            owner: None,
            owner_next: None,
            owner_conflicts: 0,
            lock: LockState::new(false),
            prereq_seen: false,
            open_conflict: true,
            close_conflict: false,
            styles: ItemStyles::default(),
        }
    }

    /// Drop the persisted aggregate after a restart, until members report.
    pub(crate) fn assume_unknown(&mut self) {
        self.arm_state = GateArmState::Unknown;
    }

    pub fn to_record(&self) -> GateArmArrayRecord {
        GateArmArrayRecord {
            name: self.name.clone(),
            geo_loc: self.geo_loc.clone(),
            notes: self.notes.clone(),
            opposing: self.opposing,
            prereq: self.prereq.clone(),
            camera: self.camera.clone(),
            approach: self.approach.clone(),
            action_plan: self.action_plan.clone(),
            arm_state: self.arm_state,
            interlock: self.interlock,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arm_state(&self) -> GateArmState {
        self.arm_state
    }

    pub fn interlock(&self) -> GateArmInterlock {
        self.interlock
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn owner_next(&self) -> Option<&str> {
        self.owner_next.as_deref()
    }

    pub fn owner_conflicts(&self) -> u32 {
        self.owner_conflicts
    }

    pub fn open_conflict(&self) -> bool {
        self.open_conflict
    }

    pub fn close_conflict(&self) -> bool {
        self.close_conflict
    }

    pub fn camera(&self) -> Option<&str> {
        self.camera.as_deref()
    }

    pub fn approach(&self) -> Option<&str> {
        self.approach.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Member arm names in slot order, empty slots skipped.
    pub fn members(&self) -> Vec<String> {
        self.arms.iter().flatten().cloned().collect()
    }

    pub fn snapshot(&self) -> ArraySnapshot {
        ArraySnapshot {
            name: self.name.clone(),
            geo_loc: self.geo_loc.clone(),
            opposing: self.opposing,
            prereq: self.prereq.clone(),
            action_plan: self.action_plan.clone(),
            state: self.arm_state,
            interlock: self.interlock,
            members: self.members(),
            owner: self.owner.clone(),
            owner_conflicts: self.owner_conflicts,
            open_conflict: self.open_conflict,
            close_conflict: self.close_conflict,
            styles: self.styles,
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Membership
    // ────────────────────────────────────────────────────────────────────

    /// Assign (or clear, with `None`) the 1-based slot `idx`.
    ///
    /// # Errors
    ///
    /// [`GateArmError::InvalidIndex`] outside `1..=MAX_ARMS`;
    /// [`GateArmError::AlreadyAssigned`] when the slot holds another arm.
    pub fn set_index(&mut self, idx: usize, arm: Option<&str>) -> Result<(), GateArmError> {
        let slot = idx
            .checked_sub(1)
            .and_then(|i| self.arms.get_mut(i))
            .ok_or(GateArmError::InvalidIndex(idx))?;
        match (slot.as_deref(), arm) {
            (Some(cur), Some(new)) if cur != new => Err(GateArmError::AlreadyAssigned {
                array: self.name.clone(),
                idx,
            }),
            _ => {
                *slot = arm.map(str::to_string);
                Ok(())
            }
        }
    }

    /// Arrays have no controller of their own.
    pub fn set_controller(&self, _controller: Option<&str>) -> Result<(), GateArmError> {
        Err(GateArmError::Veto(format!(
            "{}: gate arm arrays have no controller",
            self.name
        )))
    }

    /// Arrays have no I/O pin of their own.
    pub fn set_pin(&self, _pin: u32) -> Result<(), GateArmError> {
        Err(GateArmError::Veto(format!("{}: gate arm arrays have no pin", self.name)))
    }

    // ────────────────────────────────────────────────────────────────────
    // Owner protocol and requests
    // ────────────────────────────────────────────────────────────────────

    /// Claim the next request.  Returns `false` when another claim was
    /// already pending; the slot is then cleared.
    pub fn set_owner_next(&mut self, user: Option<String>) -> bool {
        match (&self.owner_next, user) {
            (Some(pending), Some(user)) => {
                warn!(array = %self.name, %pending, %user, "OWNER CONFLICT");
                self.owner_conflicts += 1;
                self.owner_next = None;
                false
            }
            (_, user) => {
                self.owner_next = user;
                true
            }
        }
    }

    /// Check `requested` against the current state and interlock.
    ///
    /// Returns the transition to carry out, which differs from `requested`
    /// only when `WARN_CLOSE` is skipped because no sign would show it.
    pub fn validate(
        &self,
        requested: GateArmState,
        has_signs: bool,
    ) -> Result<GateArmState, GateArmError> {
        use GateArmState::*;
        let cur = self.arm_state;
        let (legal, allowed) = match requested {
            Opening => (
                matches!(cur, Closed | WarnClose),
                self.interlock.is_open_allowed(),
            ),
            WarnClose => (cur == Open, self.interlock.is_close_allowed()),
            Closing => (
                matches!(cur, Open | WarnClose),
                self.interlock.is_close_allowed(),
            ),
            _ => (false, false),
        };
        if !legal {
            return Err(GateArmError::InvalidTransition {
                from: cur,
                to: requested,
            });
        }
        if !allowed {
            return Err(GateArmError::InterlockConflict {
                name: self.name.clone(),
                interlock: self.interlock,
            });
        }
        if requested == WarnClose && !has_signs {
            return Ok(Closing);
        }
        Ok(requested)
    }

    /// Operator request to move the array.
    ///
    /// Consumes the pending owner claim, validates, and returns the target
    /// to forward to every member, or `None` when nothing must be sent.
    /// `WARN_CLOSE` only updates state and the plan phase; `OPENING` from
    /// `WARN_CLOSE` cancels the warning and returns straight to `OPEN`, the
    /// members never having moved.
    pub fn request_state_change(
        &mut self,
        target: GateArmState,
        svc: &Services,
    ) -> Result<Option<GateArmState>, GateArmError> {
        let owner = self.owner_next.take();
        if owner.is_none() {
            debug!(array = %self.name, %target, "request without owner");
        }
        let has_signs = self
            .action_plan
            .as_deref()
            .is_some_and(|p| svc.plans.has_signs(p));
        let effective = self.validate(target, has_signs).inspect_err(|e| {
            warn!(array = %self.name, %target, user = owner.as_deref(), error = %e, "request rejected");
        })?;
        info!(array = %self.name, %target, %effective, user = owner.as_deref(), "array request");
        self.owner = owner;
        match (self.arm_state, effective) {
            (_, GateArmState::WarnClose) => {
                self.set_arm_state(GateArmState::WarnClose, svc);
                Ok(None)
            }
            (GateArmState::WarnClose, GateArmState::Opening) => {
                self.set_arm_state(GateArmState::Open, svc);
                Ok(None)
            }
            _ => Ok(Some(effective)),
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // State
    // ────────────────────────────────────────────────────────────────────

    /// Recompute the aggregate state after a member reported.
    ///
    /// `members` must hold a snapshot of every arm in the array.
    pub fn reconcile(&mut self, members: &[ArmSnapshot], svc: &Services) {
        let agg = aggregate(members.iter().filter(|m| m.active).map(|m| m.state));
        let hold = self.arm_state == GateArmState::WarnClose && agg == GateArmState::Open;
        if !hold && agg != self.arm_state {
            self.set_arm_state(agg, svc);
        }
        self.update_styles(members, svc);
    }

    fn set_arm_state(&mut self, state: GateArmState, svc: &Services) {
        info!(array = %self.name, from = %self.arm_state, to = %state, user = self.owner.as_deref(), "array state");
        let _ = svc.persist(&self.entity, "arm_state", state);
        self.arm_state = state;
        svc.log_event(&GateArmEvent::new(
            self.entity.clone(),
            state,
            None,
            self.owner.clone(),
        ));
        svc.publish(&self.entity, "armState");
        self.update_plan_phase(svc);
        if !(state.is_moving() || state == GateArmState::WarnClose) {
            self.owner = None;
        }
    }

    fn update_plan_phase(&mut self, svc: &Services) {
        let open = self.arm_state == GateArmState::Open;
        if open == self.plan_open {
            return;
        }
        self.plan_open = open;
        let Some(plan) = self.action_plan.as_deref() else {
            return;
        };
        let phase = if open { PHASE_OPEN } else { PHASE_CLOSED };
        if svc.plans.request_phase(plan, phase, self.owner.as_deref()) {
            info!(array = %self.name, plan, phase, "plan phase changed");
        }
    }

    fn update_styles(&mut self, members: &[ArmSnapshot], svc: &Services) {
        let mut s = ItemStyles::ALL;
        if !Self::is_active(members) {
            s.insert(ItemStyles::INACTIVE);
        } else {
            if members.iter().any(|m| m.failed) {
                s.insert(ItemStyles::FAILED);
            }
            match self.arm_state {
                GateArmState::Closed => s.insert(ItemStyles::CLOSED),
                GateArmState::Open | GateArmState::WarnClose => s.insert(ItemStyles::OPEN),
                GateArmState::Opening | GateArmState::Closing => s.insert(ItemStyles::MOVING),
                GateArmState::Fault => s.insert(ItemStyles::MAINTENANCE),
                GateArmState::Unknown => {}
            }
        }
        if s != self.styles {
            self.styles = s;
            svc.publish(&self.entity, "styles");
        }
    }

    /// An array is active when it has members and every one is active.
    pub fn is_active(members: &[ArmSnapshot]) -> bool {
        !members.is_empty() && members.iter().all(|m| m.active)
    }

    // ────────────────────────────────────────────────────────────────────
    // Dependency transaction
    // ────────────────────────────────────────────────────────────────────

    /// Start a sweep.  `enabled` is false when the system is disabled or
    /// the array is inactive.
    pub fn begin_dependencies(&mut self, enabled: bool) {
        self.lock = LockState::new(enabled);
        self.prereq_seen = false;
    }

    /// Fold in the facts contributed by one other array.
    pub fn check_dependencies(&mut self, other: &ArraySnapshot) {
        if other.name == self.name {
            return;
        }
        if self.opposing
            && other.opposing
            && self.geo_loc.opposes(&other.geo_loc)
            && other.state.is_possibly_open()
        {
            self.lock.raise_opposing_open();
        }
        if self.prereq.as_deref() == Some(other.name.as_str()) {
            self.prereq_seen = true;
            if other.state != GateArmState::Open {
                self.lock.raise_downstream_closed();
            }
        }
        if other.prereq.as_deref() == Some(self.name.as_str()) && other.state.is_possibly_open() {
            self.lock.raise_upstream_open();
        }
    }

    /// Finish a sweep: merge member lock states and publish the interlock
    /// once.  Returns `true` when the interlock changed.
    pub fn commit_dependencies(
        &mut self,
        member_locks: impl IntoIterator<Item = LockState>,
        svc: &Services,
    ) -> bool {
        if self.prereq.is_some() && !self.prereq_seen {
            self.lock.raise_downstream_closed();
        }
        for m in member_locks {
            self.lock.merge(&m);
        }
        let interlock = self.lock.interlock();
        let changed = interlock != self.interlock;
        if changed {
            info!(array = %self.name, from = %self.interlock, to = %interlock, "array interlock");
            let _ = svc.persist(&self.entity, "interlock", interlock);
            self.interlock = interlock;
            svc.publish(&self.entity, "interlock");
        }
        self.update_conflicts(svc);
        changed
    }

    fn update_conflicts(&mut self, svc: &Services) {
        let open = self.lock.is_open_denied() && self.arm_state.is_possibly_open();
        if open && !self.open_conflict {
            warn!(array = %self.name, state = %self.arm_state, "open conflict");
            svc.alert(&format!("OPEN CONFLICT: {}", self.name));
        }
        self.open_conflict = open;

        let close = self.lock.is_close_denied() && self.arm_state == GateArmState::Closed;
        if close && !self.close_conflict {
            warn!(array = %self.name, "close conflict");
            svc.alert(&format!("CLOSE CONFLICT: {}", self.name));
        }
        self.close_conflict = close;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::StaticPlans;
    use crate::testing::Harness;
    use GateArmState::*;

    fn array(h: &Harness, name: &str, state: GateArmState, interlock: GateArmInterlock) -> GateArmArray {
        let mut rec = GateArmArrayRecord::new(name);
        rec.arm_state = state;
        let mut ga = h.array(rec);
        ga.interlock = interlock;
        ga
    }

    #[test]
    fn aggregate_examples() {
        assert_eq!(aggregate([Open, Open]), Open);
        assert_eq!(aggregate([Open, Closed]), Fault);
        assert_eq!(aggregate([Unknown, Closed]), Unknown);
        assert_eq!(aggregate([Opening, Closed]), Opening);
        assert_eq!(aggregate([Closing, Open]), Closing);
        assert_eq!(aggregate([Opening, Closing]), Fault);
        assert_eq!(aggregate([Fault, Opening]), Fault);
        assert_eq!(aggregate([Unknown, Fault]), Unknown);
        assert_eq!(aggregate([Closed, Closed]), Closed);
        assert_eq!(aggregate([]), Unknown);
    }

    #[test]
    fn owner_conflict_clears_slot_once() {
        let h = Harness::new();
        let mut ga = array(&h, "ramp_a", Closed, GateArmInterlock::None);
        assert!(ga.set_owner_next(Some("alice".into())));
        assert!(!ga.set_owner_next(Some("bob".into())));
        assert_eq!(ga.owner_next(), None);
        assert_eq!(ga.owner_conflicts(), 1);
        // Slot is free again.
        assert!(ga.set_owner_next(Some("carol".into())));
        assert_eq!(ga.owner_conflicts(), 1);
    }

    #[test]
    fn request_consumes_claim_even_on_failure() {
        let h = Harness::new();
        let mut ga = array(&h, "ramp_a", Closed, GateArmInterlock::None);
        ga.set_owner_next(Some("alice".into()));
        assert!(ga.request_state_change(Closing, &h.svc).is_err());
        assert_eq!(ga.owner_next(), None);
    }

    #[test]
    fn validate_transitions() {
        let h = Harness::new();
        let ga = array(&h, "a", Closed, GateArmInterlock::None);
        assert_eq!(ga.validate(Opening, true), Ok(Opening));
        assert!(matches!(
            ga.validate(Closing, true),
            Err(GateArmError::InvalidTransition { from: Closed, to: Closing })
        ));
        assert!(ga.validate(Open, true).is_err());

        let ga = array(&h, "b", Open, GateArmInterlock::None);
        assert_eq!(ga.validate(WarnClose, true), Ok(WarnClose));
        assert_eq!(ga.validate(WarnClose, false), Ok(Closing));
        assert_eq!(ga.validate(Closing, true), Ok(Closing));
        assert!(ga.validate(Opening, true).is_err());

        let ga = array(&h, "c", WarnClose, GateArmInterlock::None);
        assert_eq!(ga.validate(Closing, true), Ok(Closing));
        assert_eq!(ga.validate(Opening, true), Ok(Opening));

        for st in [Unknown, Fault] {
            let ga = array(&h, "d", st, GateArmInterlock::None);
            for target in [Opening, WarnClose, Closing] {
                assert!(matches!(
                    ga.validate(target, true),
                    Err(GateArmError::InvalidTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn validate_respects_interlock() {
        let h = Harness::new();
        let ga = array(&h, "a", Closed, GateArmInterlock::DenyOpen);
        assert!(matches!(
            ga.validate(Opening, true),
            Err(GateArmError::InterlockConflict { .. })
        ));
        let ga = array(&h, "b", Open, GateArmInterlock::SystemDisable);
        assert!(matches!(
            ga.validate(Closing, true),
            Err(GateArmError::InterlockConflict { .. })
        ));
    }

    #[test]
    fn warn_close_updates_state_and_plan_without_command() {
        let plans = StaticPlans::new().with_plan("plan_a", true);
        let h = Harness::with_plans(plans);
        let mut rec = GateArmArrayRecord::new("ramp_a");
        rec.arm_state = Open;
        rec.action_plan = Some("plan_a".to_string());
        let mut ga = h.array(rec);
        ga.interlock = GateArmInterlock::None;
        ga.set_owner_next(Some("alice".into()));

        assert_eq!(ga.request_state_change(WarnClose, &h.svc), Ok(None));
        assert_eq!(ga.arm_state(), WarnClose);
        assert!(h.poller.sent().is_empty());
        assert_eq!(h.plans.phase("plan_a").as_deref(), Some(PHASE_CLOSED));
        assert_eq!(h.plans.last_user("plan_a").as_deref(), Some("alice"));
    }

    #[test]
    fn opening_cancels_warn_close_without_command() {
        let plans = StaticPlans::new().with_plan("plan_a", true);
        let h = Harness::with_plans(plans);
        let mut rec = GateArmArrayRecord::new("ramp_a");
        rec.arm_state = Open;
        rec.action_plan = Some("plan_a".to_string());
        let mut ga = h.array(rec);
        ga.interlock = GateArmInterlock::None;

        assert_eq!(ga.request_state_change(WarnClose, &h.svc), Ok(None));
        assert_eq!(ga.request_state_change(Opening, &h.svc), Ok(None));
        assert_eq!(ga.arm_state(), Open);
        assert!(h.poller.sent().is_empty());
        assert_eq!(h.plans.phase("plan_a").as_deref(), Some(PHASE_OPEN));
    }

    #[test]
    fn warn_close_is_not_downgraded_by_open_members() {
        let h = Harness::new();
        let mut ga = array(&h, "ramp_a", WarnClose, GateArmInterlock::None);
        let mut m = crate::gate_arm::GateArm::from_record(crate::gate_arm::tests::record("ga_1"))
            .snapshot();
        m.state = Open;
        ga.reconcile(std::slice::from_ref(&m), &h.svc);
        assert_eq!(ga.arm_state(), WarnClose);

        m.state = Closing;
        ga.reconcile(std::slice::from_ref(&m), &h.svc);
        assert_eq!(ga.arm_state(), Closing);
    }

    #[test]
    fn slot_assignment_is_immutable() {
        let h = Harness::new();
        let mut ga = array(&h, "ramp_a", Closed, GateArmInterlock::None);
        ga.set_index(1, Some("ga_1")).unwrap();
        ga.set_index(1, Some("ga_1")).unwrap();
        assert_eq!(
            ga.set_index(1, Some("ga_2")),
            Err(GateArmError::AlreadyAssigned {
                array: "ramp_a".into(),
                idx: 1
            })
        );
        assert_eq!(ga.set_index(0, Some("ga_2")), Err(GateArmError::InvalidIndex(0)));
        assert_eq!(
            ga.set_index(MAX_ARMS + 1, Some("ga_2")),
            Err(GateArmError::InvalidIndex(MAX_ARMS + 1))
        );
        ga.set_index(1, None).unwrap();
        ga.set_index(1, Some("ga_2")).unwrap();
        assert_eq!(ga.members(), vec!["ga_2".to_string()]);
    }

    #[test]
    fn controller_assignment_is_vetoed() {
        let h = Harness::new();
        let ga = array(&h, "ramp_a", Closed, GateArmInterlock::None);
        assert!(matches!(ga.set_controller(Some("ctl")), Err(GateArmError::Veto(_))));
        assert!(matches!(ga.set_pin(3), Err(GateArmError::Veto(_))));
    }

    #[test]
    fn missing_prereq_counts_as_closed() {
        let h = Harness::new();
        let mut rec = GateArmArrayRecord::new("a");
        rec.prereq = Some("b".to_string());
        let mut ga = h.array(rec);
        ga.begin_dependencies(true);
        ga.commit_dependencies([], &h.svc);
        assert_eq!(ga.interlock(), GateArmInterlock::DenyOpen);
    }

    #[test]
    fn commit_publishes_interlock_once() {
        let h = Harness::new();
        let mut ga = array(&h, "a", Closed, GateArmInterlock::SystemDisable);
        ga.begin_dependencies(true);
        assert!(ga.commit_dependencies([LockState::new(true)], &h.svc));
        ga.begin_dependencies(true);
        assert!(!ga.commit_dependencies([LockState::new(true)], &h.svc));
        assert_eq!(h.publisher.count("a", "interlock"), 1);
    }
}
