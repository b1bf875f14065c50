//! Hardware command boundary for gate arm controllers.
//!
//! The runtime never talks to a controller directly.  It hands commands to
//! a [`GateArmPoller`], which queues them for the external polling
//! framework.  Every call is fire-and-forget: success or failure surfaces
//! later as a [`HardwareEvent`][crate::status::HardwareEvent].

use iris_types::{DeviceRequest, GateArmError, GateArmInterlock};
use serde::{Deserialize, Serialize};

/// Controller binding of one gate arm, as needed to address a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmTarget {
    pub name: String,
    pub controller: Option<String>,
    pub pin: u32,
}

/// Outbound command queued for a gate arm controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload")]
pub enum HardwareCommand {
    Open { arm: ArmTarget, owner: Option<String> },
    Close { arm: ArmTarget, owner: Option<String> },
    /// Tell the controller which movements are currently permitted.
    InterlockAdvisory { arm: ArmTarget, interlock: GateArmInterlock },
    Request { arm: ArmTarget, request: DeviceRequest },
}

impl HardwareCommand {
    /// Name of the addressed arm.
    pub fn arm_name(&self) -> &str {
        match self {
            HardwareCommand::Open { arm, .. }
            | HardwareCommand::Close { arm, .. }
            | HardwareCommand::InterlockAdvisory { arm, .. }
            | HardwareCommand::Request { arm, .. } => &arm.name,
        }
    }

    /// `true` for commands that physically move an arm.
    pub fn is_movement(&self) -> bool {
        matches!(self, HardwareCommand::Open { .. } | HardwareCommand::Close { .. })
    }
}

/// Command sink for gate arm controllers.
///
/// # Errors
///
/// Every method returns [`GateArmError::Hardware`] when the command cannot
/// even be queued (link down, queue closed).  The runtime treats that as a
/// comm failure and disables the gate arm system.
pub trait GateArmPoller: Send + Sync {
    fn send_open(&self, arm: &ArmTarget, owner: Option<&str>) -> Result<(), GateArmError>;

    fn send_close(&self, arm: &ArmTarget, owner: Option<&str>) -> Result<(), GateArmError>;

    fn send_interlock_advisory(
        &self,
        arm: &ArmTarget,
        interlock: GateArmInterlock,
    ) -> Result<(), GateArmError>;

    fn send_request(&self, arm: &ArmTarget, request: DeviceRequest) -> Result<(), GateArmError>;
}
