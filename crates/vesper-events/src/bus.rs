//! Event bus for broadcasting events to subscribers.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::event::RouterEvent;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Fan-out bus for router events.
///
/// Every subscriber sees every event in publication order. The buffer
/// is bounded, so a subscriber that stalls long enough loses its
/// oldest unread events; consumers are expected to be idempotent.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<RouterEvent>>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers that got the event.
    pub fn publish(&self, event: RouterEvent) -> usize {
        let event = Arc::new(event);

        trace!(event_type = %event.event_type(), "publishing event");

        // send() errs only when no receiver exists; a broadcast into an
        // empty room delivers to zero subscribers rather than failing.
        let delivered = self.sender.send(Arc::clone(&event)).unwrap_or(0);
        debug!(event_type = %event.event_type(), delivered, "event published");
        delivered
    }

    /// Subscribe to events.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Current number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            capacity: self.capacity,
        }
    }
}

/// Receiver for events from the bus.
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<RouterEvent>>,
}

impl EventReceiver {
    /// Receive the next event, or `None` once the channel closes.
    ///
    /// Delivery is at-least-once over a bounded buffer: a receiver that
    /// falls too far behind loses the overwritten events, is warned
    /// about how many it missed, and resumes from the oldest survivor.
    pub async fn recv(&mut self) -> Option<Arc<RouterEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "receiver fell behind, resuming past missed events");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive the next event without blocking, riding through lag the
    /// same way [`EventReceiver::recv`] does.
    pub fn try_recv(&mut self) -> Option<Arc<RouterEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "receiver fell behind, resuming past missed events");
                },
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}
