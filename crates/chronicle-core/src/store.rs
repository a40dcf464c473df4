//! Event store abstraction.
//!
//! Implementations must make the version check in [`EventStore::append`]
//! and the subsequent writes atomic with respect to other appends for the
//! same aggregate, e.g. through a unique `(aggregate_id, version)` index
//! enforced inside a transaction. A read-then-insert done purely in
//! application code races under real concurrency.

use async_trait::async_trait;

use crate::error::{BoxError, DomainError};
use crate::event::{PendingEvent, Snapshot, StoredEvent};

/// The append-only event log plus its snapshot side table.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append `events` to an aggregate stream with optimistic concurrency.
    ///
    /// `expected_version` is the stream's current version as last seen by
    /// the caller; -1 means the aggregate must not exist yet. The new events
    /// get versions `expected_version + 1` onwards. An empty batch is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` without writing anything
    /// when the stream is not at `expected_version`. Backing-store failures
    /// are returned as `DomainError::Infrastructure`.
    async fn append(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        events: Vec<PendingEvent>,
        expected_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Load all events for an aggregate, ordered by version.
    async fn get_events(&self, aggregate_id: &str) -> Result<Vec<StoredEvent>, DomainError>;

    /// Load the events with a version strictly greater than `from_version`,
    /// ordered by version.
    async fn get_events_from(
        &self,
        aggregate_id: &str,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Returns the highest stored version, or -1 when the stream is empty.
    async fn get_current_version(&self, aggregate_id: &str) -> Result<i64, DomainError>;

    /// Returns `true` if at least one event is stored for the aggregate.
    async fn exists(&self, aggregate_id: &str) -> Result<bool, DomainError>;

    /// Insert a snapshot row. Existing snapshots are left untouched.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<(), DomainError>;

    /// Returns the snapshot with the highest version, if any.
    async fn get_latest_snapshot(&self, aggregate_id: &str)
    -> Result<Option<Snapshot>, DomainError>;
}

/// Receives every event after it has been durably appended.
///
/// Used downstream by webhook dispatch, SSE broadcast and audit logging.
/// A failure is reported back to the store, which logs it; it never fails
/// or rolls back the append.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Publish one stored event.
    async fn publish(&self, event: &StoredEvent) -> Result<(), BoxError>;
}

/// Publishes `events` one by one, logging failures instead of returning them.
pub async fn publish_all(sink: &dyn NotificationSink, events: &[StoredEvent]) {
    for event in events {
        if let Err(error) = sink.publish(event).await {
            tracing::warn!(
                aggregate_id = %event.aggregate_id,
                version = event.version,
                event_type = %event.event_type,
                %error,
                "failed to publish stored event"
            );
        }
    }
}
