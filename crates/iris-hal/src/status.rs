//! Inbound controller reports.
//!
//! Controllers report each arm's position as a small set of limit/motion
//! flags.  [`ArmStatus::state`] folds those flags into a
//! [`GateArmState`]; the polling framework then delivers a
//! [`HardwareEvent`] to the runtime.

use iris_types::GateArmState;
use serde::{Deserialize, Serialize};

/// Raw status flags for one arm, as read from a controller register.
///
/// | Bit | Meaning |
/// |-----|---------|
/// | 0 | open limit switch |
/// | 1 | closed limit switch |
/// | 2 | motor opening |
/// | 3 | motor closing |
/// | 4 | fault latched |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArmStatus(u8);

impl ArmStatus {
    pub const OPEN: u8 = 1 << 0;
    pub const CLOSED: u8 = 1 << 1;
    pub const OPENING: u8 = 1 << 2;
    pub const CLOSING: u8 = 1 << 3;
    pub const FAULT: u8 = 1 << 4;

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    fn has(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    /// Decode the flags.  Fault wins over motion, motion wins over limit
    /// switches, and no flags at all is `UNKNOWN`.
    pub fn state(self) -> GateArmState {
        if self.has(Self::FAULT) {
            GateArmState::Fault
        } else if self.has(Self::OPENING) {
            GateArmState::Opening
        } else if self.has(Self::CLOSING) {
            GateArmState::Closing
        } else if self.has(Self::OPEN) {
            GateArmState::Open
        } else if self.has(Self::CLOSED) {
            GateArmState::Closed
        } else {
            GateArmState::Unknown
        }
    }
}

/// Report delivered by the polling framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HardwareEvent {
    /// New arm state, with an optional fault description.
    ArmState {
        arm: String,
        state: GateArmState,
        fault: Option<String>,
    },
    CommFailed { arm: String },
    CommRestored { arm: String },
    /// Controller firmware version read during a status query.
    Version { arm: String, version: String },
}

impl HardwareEvent {
    /// Build an [`HardwareEvent::ArmState`] from raw status flags.
    pub fn from_status(arm: impl Into<String>, status: ArmStatus, fault: Option<String>) -> Self {
        HardwareEvent::ArmState {
            arm: arm.into(),
            state: status.state(),
            fault,
        }
    }

    pub fn arm(&self) -> &str {
        match self {
            HardwareEvent::ArmState { arm, .. }
            | HardwareEvent::CommFailed { arm }
            | HardwareEvent::CommRestored { arm }
            | HardwareEvent::Version { arm, .. } => arm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_status_is_unknown() {
        assert_eq!(ArmStatus::default().state(), GateArmState::Unknown);
    }

    #[test]
    fn limit_switches_decode() {
        assert_eq!(ArmStatus::from_bits(ArmStatus::OPEN).state(), GateArmState::Open);
        assert_eq!(ArmStatus::from_bits(ArmStatus::CLOSED).state(), GateArmState::Closed);
    }

    #[test]
    fn fault_beats_everything() {
        let bits = ArmStatus::FAULT | ArmStatus::OPENING | ArmStatus::OPEN;
        assert_eq!(ArmStatus::from_bits(bits).state(), GateArmState::Fault);
    }

    #[test]
    fn motion_beats_limit_switch() {
        let bits = ArmStatus::CLOSING | ArmStatus::OPEN;
        assert_eq!(ArmStatus::from_bits(bits).state(), GateArmState::Closing);
        let bits = ArmStatus::OPENING | ArmStatus::CLOSING;
        assert_eq!(ArmStatus::from_bits(bits).state(), GateArmState::Opening);
    }

    #[test]
    fn both_limits_prefer_open() {
        let bits = ArmStatus::OPEN | ArmStatus::CLOSED;
        assert_eq!(ArmStatus::from_bits(bits).state(), GateArmState::Open);
    }

    #[test]
    fn event_from_status() {
        let ev = HardwareEvent::from_status("ga_1", ArmStatus::from_bits(ArmStatus::CLOSED), None);
        assert_eq!(ev.arm(), "ga_1");
        assert!(matches!(ev, HardwareEvent::ArmState { state: GateArmState::Closed, .. }));
    }
}
