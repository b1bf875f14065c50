//! [`BusNotifier`] – routes engine notifications onto the [`EventBus`].
//!
//! Both boundaries are fire-and-forget: a bus with no subscribers is
//! normal (no operator client connected) and only logged at debug level.

use iris_types::{AlertSink, ChangePublisher, EntityRef, Event, EventPayload};
use tracing::{debug, warn};

use crate::bus::{EventBus, Topic};

const SOURCE: &str = "iris-middleware::notifier";

#[derive(Clone, Debug)]
pub struct BusNotifier {
    bus: EventBus,
}

impl BusNotifier {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

impl ChangePublisher for BusNotifier {
    fn publish(&self, entity: &EntityRef, attribute: &str) {
        let event = Event::new(
            SOURCE,
            EventPayload::AttributeChanged {
                entity: entity.clone(),
                attribute: attribute.to_string(),
            },
        );
        if let Err(e) = self.bus.publish_to(Topic::Attributes, event) {
            debug!(%entity, attribute, error = %e, "attribute change not delivered");
        }
    }
}

impl AlertSink for BusNotifier {
    fn send_alert(&self, message: &str) {
        warn!(alert = message, "operator alert");
        let event = Event::new(
            SOURCE,
            EventPayload::Alert {
                message: message.to_string(),
            },
        );
        if let Err(e) = self.bus.publish_to(Topic::SystemAlerts, event) {
            debug!(error = %e, "alert not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_attribute_topic() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Attributes);
        let notifier = BusNotifier::new(bus);

        notifier.publish(&EntityRef::gate_arm("ga_1"), "armState");

        match rx.recv().await?.payload {
            EventPayload::AttributeChanged { entity, attribute } => {
                assert_eq!(entity.name, "ga_1");
                assert_eq!(attribute, "armState");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn alert_reaches_alert_topic() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::SystemAlerts);
        let notifier = BusNotifier::new(bus);

        notifier.send_alert("SYSTEM DISABLED: ramp_a: startup");
        assert!(matches!(rx.recv().await?.payload, EventPayload::Alert { .. }));
        Ok(())
    }

    #[test]
    fn no_subscribers_is_not_fatal() {
        let notifier = BusNotifier::new(EventBus::default());
        notifier.publish(&EntityRef::gate_arm_array("ramp_a"), "interlock");
        notifier.send_alert("nobody listening");
    }
}
