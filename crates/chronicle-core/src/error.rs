//! Domain error types.

use thiserror::Error;

/// Boxed error used to carry backing-store failures without reclassifying them.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(String),

    /// Optimistic concurrency conflict.
    #[error(
        "concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: String,
        /// The version the writer expected the stream to be at.
        expected: i64,
        /// The actual version found in the store.
        actual: i64,
    },

    /// An event, snapshot state or metadata map could not be encoded or decoded.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// A backing-store failure, carried unmodified.
    #[error(transparent)]
    Infrastructure(BoxError),
}

impl DomainError {
    /// Wraps a backing-store error.
    pub fn infrastructure<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Infrastructure(Box::new(err))
    }

    /// Returns `true` if this is an optimistic concurrency conflict.
    #[must_use]
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Errors raised by the event serializer.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// The event type name has no registered decoder.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// A value could not be encoded.
    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    /// Stored text could not be decoded into the expected shape.
    #[error("failed to decode {type_name}: {source}")]
    Decode {
        /// The event type or shape that was being decoded.
        type_name: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}
