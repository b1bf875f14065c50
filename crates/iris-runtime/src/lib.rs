//! `iris-runtime` – the gate arm interlock engine.
//!
//! # Modules
//!
//! - [`gate_arm`] – [`GateArm`]: one physical arm.  Applies hardware
//!   reports, computes its own interlock from its neighbours and forwards
//!   open/close commands the interlock permits.
//! - [`dependency`] – [`Dependencies`][dependency::Dependencies]: opposing,
//!   downstream and upstream neighbour lists built from road direction and
//!   notes hashtags.
//! - [`gate_arm_array`] – [`GateArmArray`]: the unit operators command.
//!   Aggregates member states, runs the single-writer owner protocol,
//!   validates transitions and drives the action plan phase.
//! - [`registry`] – [`GateArmRegistry`]: lookup by name, lifecycle, the
//!   operator request path, inbound hardware events and the periodic
//!   dependency sweep.
//! - [`services`] – [`Services`]: the collaborator bundle; every store or
//!   hardware failure is turned into a system disable here.
//! - [`plan`] – [`PlanPhaseController`] and the in-memory [`StaticPlans`].
//! - [`driver`] – async sweep and hardware-event loops.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing].
//! - `testing` – recording test doubles and a ready-made harness.  Built
//!   for unit tests and behind the `testing` feature.
//!
//! # Safety posture
//!
//! Every arm and array starts at `SYSTEM_DISABLE` with an open conflict
//! assumed.  Nothing moves until an operator enables the system and a sweep
//! has proved the neighbours safe.

pub mod dependency;
pub mod driver;
pub mod gate_arm;
pub mod gate_arm_array;
pub mod plan;
pub mod registry;
pub mod services;
pub mod telemetry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use gate_arm::{ArmSnapshot, GateArm};
pub use gate_arm_array::{ArraySnapshot, GateArmArray, aggregate};
pub use plan::{PHASE_CLOSED, PHASE_OPEN, PlanPhaseController, StaticPlans};
pub use registry::{Device, GateArmRegistry};
pub use services::Services;
pub use telemetry::{TracerProviderGuard, init_tracing};
