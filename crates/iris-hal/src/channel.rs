//! [`ChannelPoller`] – forwards hardware commands over a tokio channel.
//!
//! The receiving half belongs to whatever drives the real (or simulated)
//! field controllers.  A closed receiver is reported as a hardware error so
//! the runtime can disable the system rather than silently lose commands.

use iris_types::{DeviceRequest, GateArmError, GateArmInterlock};
use tokio::sync::mpsc;
use tracing::debug;

use crate::poller::{ArmTarget, GateArmPoller, HardwareCommand};

/// [`GateArmPoller`] backed by an unbounded mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelPoller {
    tx: mpsc::UnboundedSender<HardwareCommand>,
}

impl ChannelPoller {
    /// Create a poller and the receiver that drains its commands.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HardwareCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, cmd: HardwareCommand) -> Result<(), GateArmError> {
        debug!(arm = cmd.arm_name(), ?cmd, "queue hardware command");
        let arm = cmd.arm_name().to_string();
        self.tx.send(cmd).map_err(|_| GateArmError::Hardware {
            arm,
            details: "command queue closed".to_string(),
        })
    }
}

impl GateArmPoller for ChannelPoller {
    fn send_open(&self, arm: &ArmTarget, owner: Option<&str>) -> Result<(), GateArmError> {
        self.send(HardwareCommand::Open {
            arm: arm.clone(),
            owner: owner.map(str::to_string),
        })
    }

    fn send_close(&self, arm: &ArmTarget, owner: Option<&str>) -> Result<(), GateArmError> {
        self.send(HardwareCommand::Close {
            arm: arm.clone(),
            owner: owner.map(str::to_string),
        })
    }

    fn send_interlock_advisory(
        &self,
        arm: &ArmTarget,
        interlock: GateArmInterlock,
    ) -> Result<(), GateArmError> {
        self.send(HardwareCommand::InterlockAdvisory {
            arm: arm.clone(),
            interlock,
        })
    }

    fn send_request(&self, arm: &ArmTarget, request: DeviceRequest) -> Result<(), GateArmError> {
        self.send(HardwareCommand::Request {
            arm: arm.clone(),
            request,
        })
    }
}
