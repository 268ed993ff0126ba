//! Event bus built on a tokio broadcast channel

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::types::{Event, EventEnvelope};

/// Capacity for the broadcast channel
const DEFAULT_CAPACITY: usize = 1000;

/// Publishes deployment progress to any number of subscribers.
///
/// Every envelope carries a sequence number taken from a counter shared by
/// all clones, so subscribers can restore publication order.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wrap `event` in an envelope and publish it.
    ///
    /// Returns the number of subscribers that received the event; with no
    /// subscribers the event is dropped and 0 is returned.
    pub fn emit(&self, event: Event) -> usize {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.sender
            .send(EventEnvelope::new(sequence, event))
            .unwrap_or(0)
    }

    /// Events published before subscribing are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total number of events emitted through this bus or its clones
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("event_count", &self.event_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deploying(module: &str) -> Event {
        Event::ModuleDeploying {
            module: module.to_string(),
        }
    }

    #[tokio::test]
    async fn test_emit_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let sent = bus.emit(deploying("RNS"));
        assert_eq!(sent, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event, deploying("RNS"));
        assert_eq!(received.sequence, 0);
    }

    #[tokio::test]
    async fn test_sequence_is_shared_between_clones() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();
        let mut rx = bus1.subscribe();

        bus1.emit(deploying("RNS"));
        bus2.emit(deploying("PublicResolver"));
        bus1.emit(deploying("ERC677"));

        let sequences: Vec<u64> = vec![
            rx.recv().await.unwrap().sequence,
            rx.recv().await.unwrap().sequence,
            rx.recv().await.unwrap().sequence,
        ];
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(bus2.event_count(), 3);
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let bus = EventBus::new();

        // No subscribers, event is dropped but still counted
        assert_eq!(bus.emit(deploying("RNS")), 0);
        assert_eq!(bus.event_count(), 1);
    }

    #[test]
    fn test_subscriber_count() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        let _rx1 = bus.subscribe();
        let _rx2 = bus.clone().subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }
}
