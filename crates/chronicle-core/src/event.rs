//! Domain event abstractions and their persisted forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trait that all domain events implement.
///
/// Concrete events for one aggregate type form a closed enum; `event_type`
/// is the discriminator written next to the payload and used to pick the
/// decoder on the way back.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type name (used for serialization routing).
    fn event_type(&self) -> &'static str;

    /// Returns the identifier of the aggregate this event belongs to.
    fn aggregate_id(&self) -> &str;

    /// Returns when the event occurred.
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// An encoded event that has not been written yet.
///
/// The store assigns `event_id` and `version` when the batch is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: String,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
    /// Encoded metadata map, absent when there is none.
    pub metadata: Option<String>,
}

/// Stored representation of a domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Aggregate this event belongs to.
    pub aggregate_id: String,
    /// Aggregate type name.
    pub aggregate_type: String,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Version within the aggregate stream, contiguous from 0.
    pub version: i64,
    /// Serialized event payload.
    pub payload: String,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
    /// Encoded metadata map (correlation id and friends).
    pub metadata: Option<String>,
}

/// A compacted state snapshot of one aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Aggregate the snapshot was taken from.
    pub aggregate_id: String,
    /// Aggregate type name.
    pub aggregate_type: String,
    /// The last event version folded into `state`.
    pub version: i64,
    /// Encoded snapshot state.
    pub state: String,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}
