//! Aggregate repository: saves and hydrates one aggregate type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::aggregate::AggregateRoot;
use crate::clock::{Clock, SystemClock};
use crate::error::DomainError;
use crate::event::{DomainEvent, PendingEvent, Snapshot, StoredEvent};
use crate::serializer::EventSerializer;
use crate::store::EventStore;

type Factory<A> = Box<dyn Fn() -> A + Send + Sync>;

/// Persists and reconstitutes aggregates of type `A` through an
/// [`EventStore`], optionally taking a snapshot every `snapshot_frequency`
/// events.
pub struct AggregateRepository<A: AggregateRoot> {
    store: Arc<dyn EventStore>,
    serializer: Arc<EventSerializer<A::Event>>,
    factory: Factory<A>,
    aggregate_type: String,
    snapshot_frequency: u32,
    clock: Arc<dyn Clock>,
}

impl<A> AggregateRepository<A>
where
    A: AggregateRoot + Default + 'static,
    A::Event: Serialize + 'static,
{
    /// Creates a repository with snapshotting disabled.
    pub fn new<F>(
        store: Arc<dyn EventStore>,
        serializer: Arc<EventSerializer<A::Event>>,
        aggregate_type: impl Into<String>,
        factory: F,
    ) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self {
            store,
            serializer,
            factory: Box::new(factory),
            aggregate_type: aggregate_type.into(),
            snapshot_frequency: 0,
            clock: Arc::new(SystemClock),
        }
    }

    /// Takes a snapshot whenever a save leaves the aggregate at a version
    /// that is a multiple of `frequency`, version 0 included. Zero disables
    /// snapshots.
    #[must_use]
    pub fn with_snapshot_frequency(mut self, frequency: u32) -> Self {
        self.snapshot_frequency = frequency;
        self
    }

    /// Uses `clock` to stamp snapshots instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the aggregate type name written with every event.
    #[must_use]
    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    fn snapshots_enabled(&self) -> bool {
        self.snapshot_frequency > 0
    }

    /// Persists the aggregate's uncommitted events.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` if another writer appended
    /// to the stream since the aggregate was loaded; the aggregate keeps its
    /// uncommitted events in that case. Serialization and backing-store
    /// failures are returned unchanged.
    pub async fn save(&self, aggregate: &mut A) -> Result<(), DomainError> {
        self.save_with_metadata(aggregate, &HashMap::new()).await
    }

    /// Like [`save`](Self::save), attaching `metadata` to every event.
    ///
    /// # Errors
    ///
    /// See [`save`](Self::save).
    #[tracing::instrument(
        skip(self, aggregate, metadata),
        fields(
            aggregate_type = %self.aggregate_type,
            aggregate_id = %aggregate.aggregate_id(),
            version = aggregate.version(),
        )
    )]
    pub async fn save_with_metadata(
        &self,
        aggregate: &mut A,
        metadata: &HashMap<String, String>,
    ) -> Result<(), DomainError> {
        if !aggregate.has_uncommitted_events() {
            return Ok(());
        }

        let event_count = i64::try_from(aggregate.uncommitted_event_count())
            .map_err(|e| DomainError::Validation(format!("too many uncommitted events: {e}")))?;
        let expected_version = aggregate.version() - event_count;

        let encoded_metadata = self.serializer.serialize_metadata(Some(metadata))?;
        let pending = aggregate
            .uncommitted_events()
            .iter()
            .map(|event| -> Result<PendingEvent, DomainError> {
                Ok(PendingEvent {
                    event_type: event.event_type().to_owned(),
                    payload: self.serializer.serialize(event)?,
                    occurred_at: event.occurred_at(),
                    metadata: encoded_metadata.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.store
            .append(
                aggregate.aggregate_id(),
                &self.aggregate_type,
                pending,
                expected_version,
            )
            .await?;
        aggregate.mark_events_as_committed();
        tracing::debug!(expected_version, event_count, "aggregate saved");

        if self.snapshots_enabled()
            && aggregate.version() % i64::from(self.snapshot_frequency) == 0
        {
            // Events are already committed; a lost snapshot only costs replay time.
            if let Err(error) = self.take_snapshot(aggregate).await {
                tracing::warn!(%error, "failed to save snapshot");
            }
        }
        Ok(())
    }

    async fn take_snapshot(&self, aggregate: &A) -> Result<(), DomainError> {
        let state = self.serializer.serialize_state(&aggregate.create_snapshot())?;
        self.store
            .save_snapshot(Snapshot {
                aggregate_id: aggregate.aggregate_id().to_owned(),
                aggregate_type: self.aggregate_type.clone(),
                version: aggregate.version(),
                state,
                created_at: self.clock.now(),
            })
            .await?;
        tracing::debug!(version = aggregate.version(), "snapshot taken");
        Ok(())
    }

    /// Reconstitutes an aggregate from its latest snapshot and the events
    /// after it, or from its full history. Returns `Ok(None)` if no events
    /// exist for `id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if a stored event has an
    /// unregistered type or an undecodable payload. Backing-store failures
    /// are returned unchanged.
    #[tracing::instrument(skip(self), fields(aggregate_type = %self.aggregate_type))]
    pub async fn find_by_id(&self, id: &str) -> Result<Option<A>, DomainError> {
        if !self.store.exists(id).await? {
            return Ok(None);
        }

        let mut aggregate = (self.factory)();

        let snapshot = if self.snapshots_enabled() {
            self.store.get_latest_snapshot(id).await?
        } else {
            None
        };

        if let Some(snapshot) = snapshot {
            let state = self.serializer.deserialize_state(&snapshot.state)?;
            aggregate.restore_from_snapshot(state);
            aggregate.state_mut().bind_id(id);

            let stored = self.store.get_events_from(id, snapshot.version).await?;
            let events = self.decode_all(&stored)?;
            tracing::debug!(
                snapshot_version = snapshot.version,
                replayed = events.len(),
                "aggregate loaded from snapshot"
            );
            aggregate.load_from_snapshot(snapshot.version, events);
            return Ok(Some(aggregate));
        }

        let stored = self.store.get_events(id).await?;
        let events = self.decode_all(&stored)?;
        tracing::debug!(replayed = events.len(), "aggregate loaded from history");
        aggregate.load_from_history(events);
        Ok(Some(aggregate))
    }

    fn decode_all(&self, stored: &[StoredEvent]) -> Result<Vec<A::Event>, DomainError> {
        stored
            .iter()
            .map(|event| {
                self.serializer
                    .deserialize(&event.payload, &event.event_type)
                    .map_err(DomainError::from)
            })
            .collect()
    }

    /// Returns `true` if any event is stored for `id`.
    ///
    /// # Errors
    ///
    /// Backing-store failures are returned unchanged.
    pub async fn exists(&self, id: &str) -> Result<bool, DomainError> {
        self.store.exists(id).await
    }

    /// Returns the stored version of `id`, or -1 if it has no events.
    ///
    /// # Errors
    ///
    /// Backing-store failures are returned unchanged.
    pub async fn get_version(&self, id: &str) -> Result<i64, DomainError> {
        self.store.get_current_version(id).await
    }
}

impl<A: AggregateRoot> fmt::Debug for AggregateRepository<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateRepository")
            .field("aggregate_type", &self.aggregate_type)
            .field("snapshot_frequency", &self.snapshot_frequency)
            .finish_non_exhaustive()
    }
}
