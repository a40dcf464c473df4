//! In-memory `EventStore` for tests, examples and single-process use.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::{PendingEvent, Snapshot, StoredEvent};
use crate::store::{EventStore, NotificationSink, publish_all};

#[derive(Default)]
struct Inner {
    streams: HashMap<String, Vec<StoredEvent>>,
    snapshots: HashMap<String, Vec<Snapshot>>,
}

/// Event store that keeps streams and snapshots in process memory.
///
/// The version check and the write of an append happen under a single lock
/// acquisition, so appends are atomic per store instance.
#[derive(Default)]
pub struct InMemoryEventStore {
    inner: Mutex<Inner>,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes every appended event to `sink`.
    #[must_use]
    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Total number of stored events across all streams.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.lock().streams.values().map(Vec::len).sum()
    }

    /// Total number of stored snapshots across all aggregates.
    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.lock().snapshots.values().map(Vec::len).sum()
    }

    // A panic while holding the lock cannot leave a half-written batch:
    // rows are pushed only after every check has passed.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for InMemoryEventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryEventStore")
            .field("events", &self.event_count())
            .field("snapshots", &self.snapshot_count())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

fn current_version(stream: Option<&Vec<StoredEvent>>) -> i64 {
    stream
        .and_then(|events| events.last())
        .map_or(-1, |event| event.version)
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[tracing::instrument(skip(self, events), fields(event_count = events.len()))]
    async fn append(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        events: Vec<PendingEvent>,
        expected_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let stored = {
            let mut inner = self.lock();
            let actual = current_version(inner.streams.get(aggregate_id));
            if actual != expected_version {
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id: aggregate_id.to_owned(),
                    expected: expected_version,
                    actual,
                });
            }

            let stored: Vec<StoredEvent> = (expected_version + 1..)
                .zip(events)
                .map(|(version, event)| StoredEvent {
                    event_id: Uuid::now_v7(),
                    aggregate_id: aggregate_id.to_owned(),
                    aggregate_type: aggregate_type.to_owned(),
                    event_type: event.event_type,
                    version,
                    payload: event.payload,
                    occurred_at: event.occurred_at,
                    metadata: event.metadata,
                })
                .collect();

            inner
                .streams
                .entry(aggregate_id.to_owned())
                .or_default()
                .extend(stored.iter().cloned());
            stored
        };
        tracing::debug!(
            new_version = current_version(Some(&stored)),
            "events appended to stream"
        );

        if let Some(sink) = &self.sink {
            publish_all(sink.as_ref(), &stored).await;
        }
        Ok(stored)
    }

    async fn get_events(&self, aggregate_id: &str) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .lock()
            .streams
            .get(aggregate_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_events_from(
        &self,
        aggregate_id: &str,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .lock()
            .streams
            .get(aggregate_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|event| event.version > from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_current_version(&self, aggregate_id: &str) -> Result<i64, DomainError> {
        Ok(current_version(self.lock().streams.get(aggregate_id)))
    }

    async fn exists(&self, aggregate_id: &str) -> Result<bool, DomainError> {
        Ok(self
            .lock()
            .streams
            .get(aggregate_id)
            .is_some_and(|events| !events.is_empty()))
    }

    #[tracing::instrument(
        skip(self, snapshot),
        fields(aggregate_id = %snapshot.aggregate_id, version = snapshot.version)
    )]
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<(), DomainError> {
        self.lock()
            .snapshots
            .entry(snapshot.aggregate_id.clone())
            .or_default()
            .push(snapshot);
        tracing::debug!("snapshot saved");
        Ok(())
    }

    async fn get_latest_snapshot(
        &self,
        aggregate_id: &str,
    ) -> Result<Option<Snapshot>, DomainError> {
        Ok(self
            .lock()
            .snapshots
            .get(aggregate_id)
            .and_then(|snapshots| snapshots.iter().max_by_key(|s| s.version))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::error::BoxError;

    fn pending(event_type: &str) -> PendingEvent {
        PendingEvent {
            event_type: event_type.to_owned(),
            payload: r#"{"key":"value"}"#.to_owned(),
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            metadata: None,
        }
    }

    fn snapshot(aggregate_id: &str, version: i64) -> Snapshot {
        Snapshot {
            aggregate_id: aggregate_id.to_owned(),
            aggregate_type: "Account".to_owned(),
            version,
            state: format!(r#"{{"version":{version}}}"#),
            created_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }
    }

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<i64>>);

    #[async_trait]
    impl NotificationSink for CollectingSink {
        async fn publish(&self, event: &StoredEvent) -> Result<(), BoxError> {
            self.0.lock().unwrap().push(event.version);
            Ok(())
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl NotificationSink for BrokenSink {
        async fn publish(&self, _event: &StoredEvent) -> Result<(), BoxError> {
            Err("webhook endpoint unreachable".into())
        }
    }

    #[tokio::test]
    async fn test_append_assigns_contiguous_versions_from_zero() {
        // Arrange
        let store = InMemoryEventStore::new();

        // Act
        let stored = store
            .append("acc-1", "Account", vec![pending("A"), pending("B"), pending("C")], -1)
            .await
            .unwrap();

        // Assert
        let versions: Vec<i64> = stored.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![0, 1, 2]);
        assert!(stored.iter().all(|e| e.aggregate_type == "Account"));
        assert_eq!(store.get_current_version("acc-1").await.unwrap(), 2);
        assert_eq!(store.get_events("acc-1").await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_sequential_appends_with_correct_expected_version() {
        let store = InMemoryEventStore::new();
        store
            .append("acc-1", "Account", vec![pending("A"), pending("B")], -1)
            .await
            .unwrap();

        let stored = store
            .append("acc-1", "Account", vec![pending("C")], 1)
            .await
            .unwrap();

        assert_eq!(stored[0].version, 2);
        assert_eq!(store.get_events("acc-1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_stale_expected_version_conflicts_and_writes_nothing() {
        // Arrange
        let store = InMemoryEventStore::new();
        store
            .append("acc-1", "Account", vec![pending("A"), pending("B")], -1)
            .await
            .unwrap();

        // Act
        let result = store
            .append("acc-1", "Account", vec![pending("C"), pending("D")], 0)
            .await;

        // Assert
        match result {
            Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            }) => {
                assert_eq!(aggregate_id, "acc-1");
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
        assert_eq!(store.event_count(), 2);
    }

    #[tokio::test]
    async fn test_expected_new_stream_conflicts_when_stream_exists() {
        let store = InMemoryEventStore::new();
        store
            .append("acc-1", "Account", vec![pending("A")], -1)
            .await
            .unwrap();

        let result = store
            .append("acc-1", "Account", vec![pending("A")], -1)
            .await;

        assert!(matches!(
            result,
            Err(DomainError::ConcurrencyConflict {
                expected: -1,
                actual: 0,
                ..
            })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_appends_on_same_version_have_exactly_one_winner() {
        // Arrange
        const WRITERS: usize = 16;
        let store = Arc::new(InMemoryEventStore::new());
        store
            .append("acc-1", "Account", vec![pending("A"), pending("B"), pending("C")], -1)
            .await
            .unwrap();
        let barrier = Arc::new(tokio::sync::Barrier::new(WRITERS));

        // Act
        let handles: Vec<_> = (0..WRITERS)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    store
                        .append("acc-1", "Account", vec![pending("D"), pending("E")], 2)
                        .await
                })
            })
            .collect();
        let mut results = Vec::with_capacity(WRITERS);
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        // Assert
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| {
                matches!(
                    r,
                    Err(DomainError::ConcurrencyConflict {
                        expected: 2,
                        actual: 4,
                        ..
                    })
                )
            })
            .count();
        assert_eq!(winners, 1);
        assert_eq!(conflicts, WRITERS - 1);
        assert_eq!(store.get_current_version("acc-1").await.unwrap(), 4);
        assert_eq!(store.event_count(), 5);
    }

    #[tokio::test]
    async fn test_append_empty_batch_is_noop() {
        let store = InMemoryEventStore::new();

        let stored = store.append("acc-1", "Account", Vec::new(), 7).await.unwrap();

        assert!(stored.is_empty());
        assert!(!store.exists("acc-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_aggregate_reads_as_empty() {
        let store = InMemoryEventStore::new();

        assert!(store.get_events("missing").await.unwrap().is_empty());
        assert_eq!(store.get_current_version("missing").await.unwrap(), -1);
        assert!(!store.exists("missing").await.unwrap());
        assert!(store.get_latest_snapshot("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_events_from_is_exclusive() {
        let store = InMemoryEventStore::new();
        store
            .append(
                "acc-1",
                "Account",
                vec![pending("A"), pending("B"), pending("C"), pending("D")],
                -1,
            )
            .await
            .unwrap();

        let events = store.get_events_from("acc-1", 1).await.unwrap();

        let versions: Vec<i64> = events.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_streams_are_isolated() {
        let store = InMemoryEventStore::new();
        store
            .append("acc-a", "Account", vec![pending("A")], -1)
            .await
            .unwrap();
        store
            .append("acc-b", "Account", vec![pending("A"), pending("B")], -1)
            .await
            .unwrap();

        assert_eq!(store.get_current_version("acc-a").await.unwrap(), 0);
        assert_eq!(store.get_current_version("acc-b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_latest_snapshot_is_highest_version() {
        // Arrange
        let store = InMemoryEventStore::new();
        store.save_snapshot(snapshot("acc-1", 4)).await.unwrap();
        store.save_snapshot(snapshot("acc-1", 9)).await.unwrap();
        store.save_snapshot(snapshot("acc-1", 6)).await.unwrap();

        // Act
        let latest = store.get_latest_snapshot("acc-1").await.unwrap().unwrap();

        // Assert
        assert_eq!(latest.version, 9);
        assert_eq!(store.snapshot_count(), 3);
    }

    #[tokio::test]
    async fn test_appended_events_are_published_in_order() {
        let sink = Arc::new(CollectingSink::default());
        let store = InMemoryEventStore::new().with_notification_sink(sink.clone());

        store
            .append("acc-1", "Account", vec![pending("A"), pending("B")], -1)
            .await
            .unwrap();

        assert_eq!(*sink.0.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_append() {
        let store = InMemoryEventStore::new().with_notification_sink(Arc::new(BrokenSink));

        let result = store
            .append("acc-1", "Account", vec![pending("A")], -1)
            .await;

        assert!(result.is_ok());
        assert_eq!(store.get_current_version("acc-1").await.unwrap(), 0);
    }
}
