//! Test event stores — `EventStore` doubles that record or fail calls.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chronicle_core::error::DomainError;
use chronicle_core::event::{PendingEvent, Snapshot, StoredEvent};
use chronicle_core::memory_store::InMemoryEventStore;
use chronicle_core::store::EventStore;

/// One recorded `append` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendCall {
    /// The aggregate the events were appended to.
    pub aggregate_id: String,
    /// The aggregate type passed along.
    pub aggregate_type: String,
    /// The expected version passed by the caller.
    pub expected_version: i64,
    /// The encoded events.
    pub events: Vec<PendingEvent>,
}

/// An event store backed by `InMemoryEventStore` that records every call
/// the tests care about: appends (including rejected ones), full-history
/// reads and snapshot writes.
#[derive(Debug, Default)]
pub struct RecordingEventStore {
    inner: InMemoryEventStore,
    appends: Mutex<Vec<AppendCall>>,
    snapshots: Mutex<Vec<Snapshot>>,
    get_events_calls: AtomicUsize,
    fail_snapshots: bool,
}

impl RecordingEventStore {
    /// Create an empty recording store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `save_snapshot` call fail after being recorded.
    #[must_use]
    pub fn with_failing_snapshots(mut self) -> Self {
        self.fail_snapshots = true;
        self
    }

    /// Returns all recorded `append` calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn append_calls(&self) -> Vec<AppendCall> {
        self.appends.lock().unwrap().clone()
    }

    /// Returns all snapshots passed to `save_snapshot`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saved_snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    /// Returns how many times `get_events` was called.
    pub fn get_events_calls(&self) -> usize {
        self.get_events_calls.load(Ordering::SeqCst)
    }

    /// Returns the wrapped store, e.g. to seed events without recording.
    pub fn inner(&self) -> &InMemoryEventStore {
        &self.inner
    }
}

#[async_trait]
impl EventStore for RecordingEventStore {
    async fn append(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        events: Vec<PendingEvent>,
        expected_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.appends.lock().unwrap().push(AppendCall {
            aggregate_id: aggregate_id.to_owned(),
            aggregate_type: aggregate_type.to_owned(),
            expected_version,
            events: events.clone(),
        });
        self.inner
            .append(aggregate_id, aggregate_type, events, expected_version)
            .await
    }

    async fn get_events(&self, aggregate_id: &str) -> Result<Vec<StoredEvent>, DomainError> {
        self.get_events_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_events(aggregate_id).await
    }

    async fn get_events_from(
        &self,
        aggregate_id: &str,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.get_events_from(aggregate_id, from_version).await
    }

    async fn get_current_version(&self, aggregate_id: &str) -> Result<i64, DomainError> {
        self.inner.get_current_version(aggregate_id).await
    }

    async fn exists(&self, aggregate_id: &str) -> Result<bool, DomainError> {
        self.inner.exists(aggregate_id).await
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<(), DomainError> {
        self.snapshots.lock().unwrap().push(snapshot.clone());
        if self.fail_snapshots {
            return Err(DomainError::infrastructure(std::io::Error::other(
                "snapshot table unavailable",
            )));
        }
        self.inner.save_snapshot(snapshot).await
    }

    async fn get_latest_snapshot(
        &self,
        aggregate_id: &str,
    ) -> Result<Option<Snapshot>, DomainError> {
        self.inner.get_latest_snapshot(aggregate_id).await
    }
}

/// An event store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

fn connection_refused() -> DomainError {
    DomainError::infrastructure(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

#[async_trait]
impl EventStore for FailingEventStore {
    async fn append(
        &self,
        _aggregate_id: &str,
        _aggregate_type: &str,
        _events: Vec<PendingEvent>,
        _expected_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(connection_refused())
    }

    async fn get_events(&self, _aggregate_id: &str) -> Result<Vec<StoredEvent>, DomainError> {
        Err(connection_refused())
    }

    async fn get_events_from(
        &self,
        _aggregate_id: &str,
        _from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(connection_refused())
    }

    async fn get_current_version(&self, _aggregate_id: &str) -> Result<i64, DomainError> {
        Err(connection_refused())
    }

    async fn exists(&self, _aggregate_id: &str) -> Result<bool, DomainError> {
        Err(connection_refused())
    }

    async fn save_snapshot(&self, _snapshot: Snapshot) -> Result<(), DomainError> {
        Err(connection_refused())
    }

    async fn get_latest_snapshot(
        &self,
        _aggregate_id: &str,
    ) -> Result<Option<Snapshot>, DomainError> {
        Err(connection_refused())
    }
}
