//! Broadcast channel for observer notifications.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Coordinators
//! publish a [`RelayEvent`] after every cycle and the service publishes
//! lifecycle events; WebSocket connections subscribe.

use tokio::sync::broadcast;

use super::RelayEvent;

/// Broadcast bus for [`RelayEvent`]s.
///
/// When the ring buffer is full, the oldest events are dropped for
/// lagging receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RelayEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// With no active receivers the event is silently dropped.
    pub fn publish(&self, event: RelayEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver for all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
