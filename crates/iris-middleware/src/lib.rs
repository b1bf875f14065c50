//! `iris-middleware` – change publication and alert distribution.
//!
//! Carries attribute-change notices and operator alerts from the gate arm
//! engine to whoever is listening, without caring what they mean.
//!
//! # Modules
//!
//! - [`bus`] – topic-based publish/subscribe [`EventBus`] built on Tokio
//!   broadcast channels.
//! - [`notifier`] – [`BusNotifier`]: adapts the bus to the engine's
//!   `ChangePublisher` and `AlertSink` boundaries.

pub mod bus;
pub mod notifier;

pub use bus::{BusError, EventBus, Topic, TopicReceiver};
pub use notifier::BusNotifier;
