//! Headless publish/subscribe bus for mission telemetry.
//!
//! Uses [`tokio::sync::broadcast`] under the hood so that every subscriber
//! receives every event without any single subscriber blocking the others.
//! Publishing never blocks and never fails: the mission loop must not stall
//! because nobody is listening or a consumer fell behind.
//!
//! The channel does not need a Tokio runtime.  Async consumers call
//! [`EventSubscriber::recv`]; plain threads call
//! [`EventSubscriber::blocking_recv`].

use rescue_types::{EventPayload, MissionEvent};
use tokio::sync::broadcast;
use tracing::warn;

/// Number of buffered events before old ones are dropped for slow
/// subscribers.
const DEFAULT_CAPACITY: usize = 256;

/// Shared event bus.  Clone it cheaply – all clones share the same
/// underlying channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<MissionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `event` and return the number of subscribers that were handed
    /// it.  Zero subscribers is a normal condition.
    pub fn publish(&self, event: MissionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Wrap `payload` in a fresh [`MissionEvent`] and publish it.
    pub fn emit(&self, source: &str, payload: EventPayload) -> usize {
        self.publish(MissionEvent::new(source, payload))
    }

    /// Subscribe to every event.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            prefix: String::new(),
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to events whose `source` starts with `prefix`.
    pub fn subscribe_source(&self, prefix: impl Into<String>) -> EventSubscriber {
        EventSubscriber {
            prefix: prefix.into(),
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A receiver that only delivers events whose `source` starts with its
/// prefix.  Lag is logged and skipped over.
pub struct EventSubscriber {
    prefix: String,
    receiver: broadcast::Receiver<MissionEvent>,
}

impl EventSubscriber {
    /// Wait for the next matching event.  `None` once every bus handle has
    /// been dropped.
    pub async fn recv(&mut self) -> Option<MissionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.source.starts_with(&self.prefix) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(prefix = %self.prefix, lagged_by = n, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Blocking variant of [`recv`](Self::recv) for use outside a runtime.
    pub fn blocking_recv(&mut self) -> Option<MissionEvent> {
        loop {
            match self.receiver.blocking_recv() {
                Ok(event) if event.source.starts_with(&self.prefix) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(prefix = %self.prefix, lagged_by = n, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<MissionEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.source.starts_with(&self.prefix) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(prefix = %self.prefix, lagged_by = n, "event subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rescue_types::MissionPhase;

    fn notice(text: &str) -> EventPayload {
        EventPayload::notice(text)
    }

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = MissionEvent::new("rescue-runtime::mission", notice("hello"));
        assert_eq!(bus.publish(event.clone()), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, event.id);
    }

    #[tokio::test]
    async fn source_subscriber_filters() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe_source("rescue-runtime");

        bus.emit("rescue-hal::bridge", notice("ignored"));
        bus.emit(
            "rescue-runtime::mission",
            EventPayload::PhaseChanged {
                from: MissionPhase::Search,
                to: MissionPhase::Approach,
                reason: "human_detected".into(),
            },
        );

        let received = sub.recv().await.unwrap();
        assert!(matches!(received.payload, EventPayload::PhaseChanged { .. }));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = MissionEvent::new("test", notice("both"));
        bus.publish(event.clone());

        assert_eq!(rx1.recv().await.unwrap().id, event.id);
        assert_eq!(rx2.recv().await.unwrap().id, event.id);
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        assert_eq!(bus.emit("test", notice("nobody home")), 0);
    }

    #[test]
    fn blocking_recv_works_without_a_runtime() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit("test", notice("sync"));
        drop(bus);

        assert!(rx.blocking_recv().is_some());
        // Every sender is gone.
        assert!(rx.blocking_recv().is_none());
    }

    #[tokio::test]
    async fn slow_subscriber_skips_lagged_events() {
        let bus = EventBus::new(4);
        let mut slow = bus.subscribe();
        for i in 0..20 {
            bus.emit("flood", notice(&i.to_string()));
        }
        // The oldest surviving event is delivered rather than an error.
        let event = slow.recv().await.unwrap();
        assert!(matches!(event.payload, EventPayload::Notice { ref message } if message == "16"));
    }
}
