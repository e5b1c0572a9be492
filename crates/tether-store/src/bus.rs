//! Broadcast event bus
//!
//! Fan-out channel between the synchronization core and UI code. Publishing
//! never blocks and never fails; events sent while nobody listens are
//! dropped.

use tether_model::BusEvent;
use tokio::sync::broadcast;

/// Default channel capacity; slow subscribers past this lag see `Lagged`
const DEFAULT_CAPACITY: usize = 256;

/// Cloneable handle to the broadcast channel
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    /// Create a bus with the given buffer capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: BusEvent) {
        // A send error only means nobody is subscribed right now.
        let _ = self.tx.send(event);
    }

    /// Subscribe to all events from this point on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    #[inline]
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
