//! Event bus for engine-to-consumer communication
//!
//! Uses tokio::sync::broadcast for pub/sub pattern. Events are typed,
//! carry the parsed payloads, and are published in the same order as
//! the underlying socket events occur.

use std::sync::Arc;
use tokio::sync::broadcast;

pub mod events;

pub use events::MpdEvent;

/// Event bus handle for publishing and subscribing
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MpdEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: MpdEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> broadcast::Receiver<MpdEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    /// Default capacity (256 events)
    fn default() -> Self {
        Self::new(256)
    }
}

/// Shared event bus wrapped in Arc for thread-safe sharing
pub type SharedBus = Arc<EventBus>;

/// Create a new shared event bus
pub fn create_bus() -> SharedBus {
    Arc::new(EventBus::default())
}
