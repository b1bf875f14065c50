//! `iris-kernel` – gate arm safety core.
//!
//! Holds the safety rules that do not depend on device state.
//!
//! # Modules
//!
//! - [`lock_state`] – [`LockState`][lock_state::LockState]: folds dependency
//!   facts (opposing open, downstream closed, upstream open, system enabled)
//!   into one [`GateArmInterlock`][iris_types::GateArmInterlock].
//! - [`origin_guard`] – [`OriginGuard`][origin_guard::OriginGuard]: CIDR
//!   allow-list checked before any external state request reaches the state
//!   machine.
//! - [`system`] – [`GateArmSystem`][system::GateArmSystem]: the process-wide
//!   kill switch and operator alert path.
//! - [`comm_watchdog`] – [`CommWatchdog`][comm_watchdog::CommWatchdog]:
//!   tracks comm-failure duration so commands are never sent to an arm that
//!   has been unreachable for longer than the configured timeout.

pub mod comm_watchdog;
pub mod lock_state;
pub mod origin_guard;
pub mod system;

pub use comm_watchdog::{CommHealth, CommWatchdog};
pub use lock_state::LockState;
pub use origin_guard::{CidrBlock, OriginGuard};
pub use system::{DisableRecord, GateArmSystem};
