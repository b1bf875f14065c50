//! In-process simulation of gate arm controllers.
//!
//! [`SimPoller`] records every command and can be switched offline to
//! exercise comm-failure handling.  [`SimField`] models the arms
//! themselves: feed it a [`HardwareCommand`] and it answers with the
//! [`HardwareEvent`]s a real controller would eventually report.
//!
//! # Example
//!
//! ```rust
//! use iris_hal::poller::{ArmTarget, GateArmPoller, HardwareCommand};
//! use iris_hal::sim::{SimField, SimPoller};
//! use iris_types::GateArmState;
//!
//! let poller = SimPoller::new();
//! let arm = ArmTarget { name: "ga_1".into(), controller: None, pin: 1 };
//! poller.send_open(&arm, Some("op")).expect("sim poller is online");
//!
//! let mut field = SimField::new().with_arm("ga_1", GateArmState::Closed);
//! let cmd = poller.take().remove(0);
//! let reports = field.apply(&cmd);
//! assert_eq!(field.state("ga_1"), Some(GateArmState::Open));
//! assert_eq!(reports.len(), 2);
//! ```

use std::collections::HashMap;

use iris_types::{DeviceRequest, GateArmError, GateArmInterlock, GateArmState};
use parking_lot::Mutex;

use crate::poller::{ArmTarget, GateArmPoller, HardwareCommand};
use crate::status::HardwareEvent;

// ────────────────────────────────────────────────────────────────────────────
// Recording poller
// ────────────────────────────────────────────────────────────────────────────

/// A poller that records commands instead of sending them.
#[derive(Debug, Default)]
pub struct SimPoller {
    sent: Mutex<Vec<HardwareCommand>>,
    offline: Mutex<bool>,
}

impl SimPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every send fails with [`GateArmError::Hardware`].
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }

    /// Commands recorded so far.
    pub fn sent(&self) -> Vec<HardwareCommand> {
        self.sent.lock().clone()
    }

    /// Drain recorded commands.
    pub fn take(&self) -> Vec<HardwareCommand> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Number of open/close commands recorded so far.
    pub fn movement_count(&self) -> usize {
        self.sent.lock().iter().filter(|c| c.is_movement()).count()
    }

    fn record(&self, cmd: HardwareCommand) -> Result<(), GateArmError> {
        if *self.offline.lock() {
            return Err(GateArmError::Hardware {
                arm: cmd.arm_name().to_string(),
                details: "controller offline".to_string(),
            });
        }
        self.sent.lock().push(cmd);
        Ok(())
    }
}

impl GateArmPoller for SimPoller {
    fn send_open(&self, arm: &ArmTarget, owner: Option<&str>) -> Result<(), GateArmError> {
        self.record(HardwareCommand::Open {
            arm: arm.clone(),
            owner: owner.map(str::to_string),
        })
    }

    fn send_close(&self, arm: &ArmTarget, owner: Option<&str>) -> Result<(), GateArmError> {
        self.record(HardwareCommand::Close {
            arm: arm.clone(),
            owner: owner.map(str::to_string),
        })
    }

    fn send_interlock_advisory(
        &self,
        arm: &ArmTarget,
        interlock: GateArmInterlock,
    ) -> Result<(), GateArmError> {
        self.record(HardwareCommand::InterlockAdvisory {
            arm: arm.clone(),
            interlock,
        })
    }

    fn send_request(&self, arm: &ArmTarget, request: DeviceRequest) -> Result<(), GateArmError> {
        self.record(HardwareCommand::Request {
            arm: arm.clone(),
            request,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated field
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct SimArm {
    state: GateArmState,
    /// Last advisory received; a movement it forbids is refused with a fault.
    interlock: GateArmInterlock,
}

/// Simulated arms that move instantly in response to commands.
#[derive(Debug, Default)]
pub struct SimField {
    arms: HashMap<String, SimArm>,
    version: String,
}

impl SimField {
    pub fn new() -> Self {
        Self {
            arms: HashMap::new(),
            version: "sim-1.0".to_string(),
        }
    }

    /// Add an arm with an initial physical state.
    pub fn with_arm(mut self, name: impl Into<String>, state: GateArmState) -> Self {
        self.add_arm(name, state);
        self
    }

    pub fn add_arm(&mut self, name: impl Into<String>, state: GateArmState) {
        self.arms.insert(
            name.into(),
            SimArm {
                state,
                interlock: GateArmInterlock::None,
            },
        );
    }

    pub fn state(&self, arm: &str) -> Option<GateArmState> {
        self.arms.get(arm).map(|a| a.state)
    }

    /// Apply one command and return the reports it produces.  Commands for
    /// unknown arms produce a comm failure.
    pub fn apply(&mut self, cmd: &HardwareCommand) -> Vec<HardwareEvent> {
        let name = cmd.arm_name().to_string();
        let version = self.version.clone();
        let Some(arm) = self.arms.get_mut(&name) else {
            return vec![HardwareEvent::CommFailed { arm: name }];
        };
        let report = |state: GateArmState, fault: Option<&str>| HardwareEvent::ArmState {
            arm: name.clone(),
            state,
            fault: fault.map(str::to_string),
        };
        match cmd {
            HardwareCommand::Open { .. } if arm.interlock.is_open_denied() => {
                arm.state = GateArmState::Fault;
                vec![report(GateArmState::Fault, Some("open refused: interlock"))]
            }
            HardwareCommand::Close { .. } if arm.interlock.is_close_denied() => {
                arm.state = GateArmState::Fault;
                vec![report(GateArmState::Fault, Some("close refused: interlock"))]
            }
            HardwareCommand::Open { .. } => {
                arm.state = GateArmState::Open;
                vec![report(GateArmState::Opening, None), report(GateArmState::Open, None)]
            }
            HardwareCommand::Close { .. } => {
                arm.state = GateArmState::Closed;
                vec![report(GateArmState::Closing, None), report(GateArmState::Closed, None)]
            }
            HardwareCommand::InterlockAdvisory { interlock, .. } => {
                arm.interlock = *interlock;
                Vec::new()
            }
            HardwareCommand::Request { request, .. } => match request {
                DeviceRequest::QueryStatus => vec![
                    report(arm.state, None),
                    HardwareEvent::Version { arm: name.clone(), version },
                ],
                DeviceRequest::ResetDevice => {
                    if arm.state == GateArmState::Fault {
                        arm.state = GateArmState::Unknown;
                    }
                    vec![report(arm.state, None)]
                }
                _ => Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str) -> ArmTarget {
        ArmTarget {
            name: name.to_string(),
            controller: Some("ctl".to_string()),
            pin: 1,
        }
    }

    #[test]
    fn sim_poller_records_and_drains() {
        let poller = SimPoller::new();
        poller.send_open(&target("a"), None).unwrap();
        poller
            .send_interlock_advisory(&target("a"), GateArmInterlock::None)
            .unwrap();
        assert_eq!(poller.movement_count(), 1);
        assert_eq!(poller.take().len(), 2);
        assert!(poller.sent().is_empty());
    }

    #[test]
    fn offline_poller_fails() {
        let poller = SimPoller::new();
        poller.set_offline(true);
        assert!(poller.send_close(&target("a"), None).is_err());
        assert!(poller.sent().is_empty());
        poller.set_offline(false);
        assert!(poller.send_close(&target("a"), None).is_ok());
    }

    #[test]
    fn field_moves_arm_and_reports_motion() {
        let mut field = SimField::new().with_arm("a", GateArmState::Open);
        let reports = field.apply(&HardwareCommand::Close {
            arm: target("a"),
            owner: None,
        });
        assert_eq!(field.state("a"), Some(GateArmState::Closed));
        assert!(matches!(
            reports.as_slice(),
            [
                HardwareEvent::ArmState { state: GateArmState::Closing, .. },
                HardwareEvent::ArmState { state: GateArmState::Closed, .. },
            ]
        ));
    }

    #[test]
    fn field_refuses_movement_denied_by_advisory() {
        let mut field = SimField::new().with_arm("a", GateArmState::Closed);
        field.apply(&HardwareCommand::InterlockAdvisory {
            arm: target("a"),
            interlock: GateArmInterlock::DenyOpen,
        });
        let reports = field.apply(&HardwareCommand::Open {
            arm: target("a"),
            owner: None,
        });
        assert_eq!(field.state("a"), Some(GateArmState::Fault));
        assert_eq!(reports.len(), 1);
    }

    #[test]
    fn unknown_arm_reports_comm_failure() {
        let mut field = SimField::new();
        let reports = field.apply(&HardwareCommand::Request {
            arm: target("ghost"),
            request: DeviceRequest::QueryStatus,
        });
        assert_eq!(reports, vec![HardwareEvent::CommFailed { arm: "ghost".to_string() }]);
    }

    #[test]
    fn query_status_reports_state_and_version() {
        let mut field = SimField::new().with_arm("a", GateArmState::Closed);
        let reports = field.apply(&HardwareCommand::Request {
            arm: target("a"),
            request: DeviceRequest::QueryStatus,
        });
        assert!(matches!(reports[1], HardwareEvent::Version { .. }));
    }
}
