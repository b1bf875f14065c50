//! `iris-hal` – gate arm controller boundary.
//!
//! # Modules
//!
//! - [`poller`] – [`GateArmPoller`][poller::GateArmPoller] trait and the
//!   [`HardwareCommand`][poller::HardwareCommand] it emits.
//! - [`channel`] – [`ChannelPoller`][channel::ChannelPoller]: queues
//!   commands on a tokio channel for a field driver task.
//! - [`status`] – inbound [`HardwareEvent`][status::HardwareEvent]s and
//!   raw [`ArmStatus`][status::ArmStatus] flag decoding.
//! - [`sim`] – recording poller and simulated arms for headless tests.

pub mod channel;
pub mod poller;
pub mod sim;
pub mod status;

pub use channel::ChannelPoller;
pub use poller::{ArmTarget, GateArmPoller, HardwareCommand};
pub use sim::{SimField, SimPoller};
pub use status::{ArmStatus, HardwareEvent};
