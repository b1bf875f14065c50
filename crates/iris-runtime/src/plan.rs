//! Action-plan phase boundary.
//!
//! An array with a bound action plan drives that plan between the
//! [`PHASE_OPEN`] and [`PHASE_CLOSED`] phases so that DMS messages tied to
//! the ramp activate and deactivate with it.  Re-evaluating DMS actions
//! after a phase change belongs to the collaborator.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::info;

/// Phase requested when an array becomes open.
pub const PHASE_OPEN: &str = "gate arm open";

/// Phase requested when an array is anything other than open.
pub const PHASE_CLOSED: &str = "gate arm closed";

/// Action-plan scheduling collaborator.
pub trait PlanPhaseController: Send + Sync {
    /// Ask `plan` to move to `phase`.  Returns `true` when the phase
    /// actually changed.
    fn request_phase(&self, plan: &str, phase: &str, user: Option<&str>) -> bool;

    /// Whether any DMS action of `plan` displays a message.  When none
    /// does, a close warning has nothing to show.
    fn has_signs(&self, plan: &str) -> bool;
}

#[derive(Debug, Clone, Default)]
struct PlanEntry {
    phase: Option<String>,
    has_signs: bool,
    reevaluations: usize,
    last_user: Option<String>,
}

/// In-memory plans with a fixed sign configuration.
#[derive(Debug, Default)]
pub struct StaticPlans {
    plans: Mutex<HashMap<String, PlanEntry>>,
}

impl StaticPlans {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plan.
    pub fn with_plan(self, name: impl Into<String>, has_signs: bool) -> Self {
        self.add_plan(name, has_signs);
        self
    }

    pub fn add_plan(&self, name: impl Into<String>, has_signs: bool) {
        self.plans.lock().insert(
            name.into(),
            PlanEntry {
                has_signs,
                ..PlanEntry::default()
            },
        );
    }

    pub fn phase(&self, plan: &str) -> Option<String> {
        self.plans.lock().get(plan)?.phase.clone()
    }

    /// User credited with the last phase change.
    pub fn last_user(&self, plan: &str) -> Option<String> {
        self.plans.lock().get(plan)?.last_user.clone()
    }

    /// How many DMS re-evaluations phase changes have scheduled.
    pub fn reevaluations(&self, plan: &str) -> usize {
        self.plans.lock().get(plan).map_or(0, |p| p.reevaluations)
    }
}

impl PlanPhaseController for StaticPlans {
    fn request_phase(&self, plan: &str, phase: &str, user: Option<&str>) -> bool {
        let mut plans = self.plans.lock();
        let Some(entry) = plans.get_mut(plan) else {
            return false;
        };
        if entry.phase.as_deref() == Some(phase) {
            return false;
        }
        info!(plan, phase, user, "action plan phase change");
        entry.phase = Some(phase.to_string());
        entry.last_user = user.map(str::to_string);
        entry.reevaluations += 1;
        true
    }

    fn has_signs(&self, plan: &str) -> bool {
        self.plans.lock().get(plan).is_some_and(|p| p.has_signs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_change_schedules_reevaluation_once() {
        let plans = StaticPlans::new().with_plan("ramp_a_plan", true);
        assert!(plans.request_phase("ramp_a_plan", PHASE_OPEN, Some("op")));
        assert!(!plans.request_phase("ramp_a_plan", PHASE_OPEN, Some("op")));
        assert_eq!(plans.reevaluations("ramp_a_plan"), 1);
        assert_eq!(plans.phase("ramp_a_plan").as_deref(), Some(PHASE_OPEN));
        assert_eq!(plans.last_user("ramp_a_plan").as_deref(), Some("op"));
    }

    #[test]
    fn unknown_plan_never_changes() {
        let plans = StaticPlans::new();
        assert!(!plans.request_phase("ghost", PHASE_CLOSED, None));
        assert!(!plans.has_signs("ghost"));
    }
}
