//! Test notification sinks.

use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::error::BoxError;
use chronicle_core::event::StoredEvent;
use chronicle_core::store::NotificationSink;

/// A sink that keeps every published event.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    published: Mutex<Vec<StoredEvent>>,
}

impl RecordingNotificationSink {
    /// Create an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the published events in publication order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<StoredEvent> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn publish(&self, event: &StoredEvent) -> Result<(), BoxError> {
        self.published.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// A sink whose every publication fails.
#[derive(Debug)]
pub struct FailingNotificationSink;

#[async_trait]
impl NotificationSink for FailingNotificationSink {
    async fn publish(&self, _event: &StoredEvent) -> Result<(), BoxError> {
        Err("subscriber endpoint unreachable".into())
    }
}
