//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Attributes`] | Attribute-change notices (`armState`, `interlock`, `styles`, ...) |
//! | [`Topic::SystemAlerts`] | Operator alerts: faults, comm loss, conflicts, system disable |

use iris_types::Event;
use thiserror::Error;
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Attributes,
    SystemAlerts,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("No subscribers for topic {0:?}")]
    NoSubscribers(Topic),
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    attributes: broadcast::Sender<Event>,
    system_alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus; `capacity` applies to every topic independently.
    pub fn new(capacity: usize) -> Self {
        let (attributes, _) = broadcast::channel(capacity);
        let (system_alerts, _) = broadcast::channel(capacity);
        Self {
            attributes,
            system_alerts,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of receivers that were handed the event, or
    /// [`BusError::NoSubscribers`] when nobody is listening.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, BusError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| BusError::NoSubscribers(topic))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Attributes => &self.attributes,
            Topic::SystemAlerts => &self.system_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// `Err(Lagged(n))` means `n` events were dropped for this subscriber;
    /// `Err(Closed)` means the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking receive, for polling from synchronous code.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_types::EventPayload;

    fn alert(msg: &str) -> Event {
        Event::new(
            "iris-middleware::test",
            EventPayload::Alert {
                message: msg.to_string(),
            },
        )
    }

    #[test]
    fn publish_without_subscribers_is_error() {
        let bus = EventBus::default();
        assert_eq!(
            bus.publish_to(Topic::SystemAlerts, alert("x")),
            Err(BusError::NoSubscribers(Topic::SystemAlerts))
        );
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut s1 = bus.subscribe_to(Topic::SystemAlerts);
        let mut s2 = bus.subscribe_to(Topic::SystemAlerts);

        let event = alert("FAULT: ga_1");
        assert_eq!(bus.publish_to(Topic::SystemAlerts, event.clone())?, 2);

        assert_eq!(s1.recv().await?.id, event.id);
        assert_eq!(s2.recv().await?.id, event.id);
        Ok(())
    }

    #[tokio::test]
    async fn topics_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
        let _attrs = bus.subscribe_to(Topic::Attributes);

        bus.publish_to(Topic::Attributes, alert("not an alert"))?;

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), alerts.recv()).await;
        assert!(result.is_err(), "alerts subscriber must not see attribute traffic");
        assert_eq!(alerts.topic(), Topic::SystemAlerts);
        Ok(())
    }

    #[tokio::test]
    async fn slow_subscriber_lags() {
        let bus = EventBus::new(8);
        let mut slow = bus.subscribe_to(Topic::Attributes);
        for _ in 0..100 {
            let _ = bus.publish_to(Topic::Attributes, alert("flood"));
        }
        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }
}
