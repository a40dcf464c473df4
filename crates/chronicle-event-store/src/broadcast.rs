//! In-process fan-out of stored events over a tokio broadcast channel.
//!
//! SSE endpoints and webhook dispatchers subscribe here instead of polling
//! the event table.

use async_trait::async_trait;
use chronicle_core::error::BoxError;
use chronicle_core::event::StoredEvent;
use chronicle_core::store::NotificationSink;
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A `NotificationSink` that re-broadcasts every event to live subscribers.
///
/// Slow subscribers lag and miss events; the event table stays
/// authoritative for catching up.
#[derive(Debug, Clone)]
pub struct BroadcastNotificationSink {
    sender: broadcast::Sender<StoredEvent>,
}

impl BroadcastNotificationSink {
    /// Creates a sink buffering up to `capacity` events per subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoredEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotificationSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl NotificationSink for BroadcastNotificationSink {
    async fn publish(&self, event: &StoredEvent) -> Result<(), BoxError> {
        // Nobody listening is not a failure.
        if let Ok(receivers) = self.sender.send(event.clone()) {
            tracing::trace!(receivers, version = event.version, "event broadcast");
        }
        Ok(())
    }
}
