//! Aggregate repository behaviour, exercised with the `Customer` aggregate.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::error::{DomainError, SerializationError};
use chronicle_core::event::PendingEvent;
use chronicle_core::memory_store::InMemoryEventStore;
use chronicle_core::repository::AggregateRepository;
use chronicle_core::store::EventStore;
use chronicle_customer::application::command_handlers::customer_repository;
use chronicle_customer::domain::aggregates::Customer;
use chronicle_customer::application::command_handlers::AGGREGATE_TYPE;
use chronicle_customer::domain::events::customer_serializer;
use chronicle_test_support::{
    FailingNotificationSink, FixedClock, RecordingEventStore, RecordingNotificationSink,
};

fn clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
}

fn new_customer(id: &str, name: &str) -> Customer {
    let mut customer = Customer::new();
    customer
        .create(id, name, "owner@example.com", &clock())
        .unwrap();
    customer
}

#[tokio::test]
async fn test_save_without_uncommitted_events_never_appends() {
    // Arrange
    let store = Arc::new(RecordingEventStore::new());
    let repo = customer_repository(store.clone(), 0);
    let mut customer = Customer::new();

    // Act
    repo.save(&mut customer).await.unwrap();

    // Assert
    assert!(store.append_calls().is_empty());
}

#[tokio::test]
async fn test_create_then_two_renames_with_frequency_two_appends_once_and_snapshots_once() {
    // Arrange
    let store = Arc::new(RecordingEventStore::new());
    let repo = customer_repository(store.clone(), 2);
    let mut customer = new_customer("agg-1", "Name");
    customer.rename("X", &clock()).unwrap();
    customer.rename("Y", &clock()).unwrap();

    // Act
    repo.save(&mut customer).await.unwrap();

    // Assert
    let appended = store.append_calls();
    assert_eq!(appended.len(), 1);
    assert_eq!(appended[0].expected_version, -1);
    assert_eq!(appended[0].events.len(), 3);

    let snapshots = store.saved_snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].version, 2);
    assert_eq!(snapshots[0].aggregate_id, "agg-1");
    assert_eq!(snapshots[0].aggregate_type, "Customer");

    assert_eq!(customer.version(), 2);
    assert!(!customer.has_uncommitted_events());
}

#[tokio::test]
async fn test_second_writer_on_same_version_gets_concurrency_conflict() {
    // Arrange
    let store = Arc::new(RecordingEventStore::new());
    let seed_repo = customer_repository(store.clone(), 0);
    let mut seed = new_customer("agg-1", "Name");
    for n in 1..=5 {
        seed.rename(&format!("Name {n}"), &clock()).unwrap();
    }
    seed_repo.save(&mut seed).await.unwrap();

    let first_repo = customer_repository(store.clone(), 0);
    let second_repo = customer_repository(store.clone(), 0);
    let mut first = first_repo.find_by_id("agg-1").await.unwrap().unwrap();
    let mut second = second_repo.find_by_id("agg-1").await.unwrap().unwrap();
    assert_eq!(first.version(), 5);
    assert_eq!(second.version(), 5);

    first.rename("First", &clock()).unwrap();
    second.rename("Second", &clock()).unwrap();

    // Act
    first_repo.save(&mut first).await.unwrap();
    let result = second_repo.save(&mut second).await;

    // Assert
    match result {
        Err(DomainError::ConcurrencyConflict {
            aggregate_id,
            expected,
            actual,
        }) => {
            assert_eq!(aggregate_id, "agg-1");
            assert_eq!(expected, 5);
            assert_eq!(actual, 6);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
    assert_eq!(store.inner().get_current_version("agg-1").await.unwrap(), 6);
    assert_eq!(second.uncommitted_event_count(), 1);
    assert_eq!(second.version(), 6);

    let reloaded = first_repo.find_by_id("agg-1").await.unwrap().unwrap();
    assert_eq!(reloaded.name(), "First");
}

#[tokio::test]
async fn test_find_by_id_for_missing_aggregate_returns_none_without_reading_events() {
    let store = Arc::new(RecordingEventStore::new());
    let repo = customer_repository(store.clone(), 0);

    let found = repo.find_by_id("missing").await.unwrap();

    assert!(found.is_none());
    assert_eq!(store.get_events_calls(), 0);
    assert!(!repo.exists("missing").await.unwrap());
    assert_eq!(repo.get_version("missing").await.unwrap(), -1);
}

#[tokio::test]
async fn test_find_by_id_replays_full_history_without_snapshots() {
    // Arrange
    let store = Arc::new(RecordingEventStore::new());
    let repo = customer_repository(store.clone(), 0);
    let mut customer = new_customer("cust-1", "Ada");
    customer.change_email("ada@example.org", &clock()).unwrap();
    customer.add_note("first call", &clock()).unwrap();
    repo.save(&mut customer).await.unwrap();

    // Act
    let loaded = repo.find_by_id("cust-1").await.unwrap().unwrap();

    // Assert
    assert_eq!(store.get_events_calls(), 1);
    assert_eq!(loaded.aggregate_id(), "cust-1");
    assert_eq!(loaded.version(), 2);
    assert_eq!(loaded.email(), "ada@example.org");
    assert_eq!(loaded.note_count(), 1);
    assert!(!loaded.has_uncommitted_events());
    assert!(store.saved_snapshots().is_empty());
}

#[tokio::test]
async fn test_snapshot_hydration_matches_full_replay() {
    // Arrange
    let store = Arc::new(RecordingEventStore::new());
    let snapshot_repo = customer_repository(store.clone(), 3);
    let replay_repo = customer_repository(store.clone(), 0);

    let mut customer = new_customer("cust-2", "Ada");
    customer.rename("Ada B", &clock()).unwrap();
    customer.add_note("n1", &clock()).unwrap();
    customer.rename("Ada C", &clock()).unwrap();
    snapshot_repo.save(&mut customer).await.unwrap();

    customer.add_note("n2", &clock()).unwrap();
    customer.deactivate("moved away", &clock()).unwrap();
    snapshot_repo.save(&mut customer).await.unwrap();

    // Act
    let from_snapshot = snapshot_repo.find_by_id("cust-2").await.unwrap().unwrap();
    let get_events_calls_after_snapshot_load = store.get_events_calls();
    let from_history = replay_repo.find_by_id("cust-2").await.unwrap().unwrap();

    // Assert
    assert_eq!(store.saved_snapshots().len(), 1);
    assert_eq!(store.saved_snapshots()[0].version, 3);
    assert_eq!(get_events_calls_after_snapshot_load, 0);

    assert_eq!(from_snapshot.version(), 5);
    assert_eq!(from_snapshot.version(), from_history.version());
    assert_eq!(from_snapshot.aggregate_id(), from_history.aggregate_id());
    assert_eq!(from_snapshot.create_snapshot(), from_history.create_snapshot());
    assert!(!from_snapshot.is_active());
    assert_eq!(from_snapshot.note_count(), 2);
}

#[tokio::test]
async fn test_aggregate_loaded_from_snapshot_can_keep_saving() {
    // Arrange
    let store = Arc::new(RecordingEventStore::new());
    let repo = customer_repository(store.clone(), 2);
    let mut customer = new_customer("cust-3", "Ada");
    customer.rename("Ada B", &clock()).unwrap();
    customer.rename("Ada C", &clock()).unwrap();
    repo.save(&mut customer).await.unwrap();

    // Act
    let mut loaded = repo.find_by_id("cust-3").await.unwrap().unwrap();
    loaded.rename("Ada D", &clock()).unwrap();
    repo.save(&mut loaded).await.unwrap();

    // Assert
    let appended = store.append_calls();
    assert_eq!(appended.len(), 2);
    assert_eq!(appended[1].expected_version, 2);
    assert_eq!(appended[1].aggregate_id, "cust-3");
    assert_eq!(repo.get_version("cust-3").await.unwrap(), 3);
}

#[tokio::test]
async fn test_snapshot_failure_does_not_fail_save() {
    // Arrange
    let store = Arc::new(RecordingEventStore::new().with_failing_snapshots());
    let repo = customer_repository(store.clone(), 1);
    let mut customer = new_customer("cust-4", "Ada");
    customer.rename("Ada B", &clock()).unwrap();

    // Act
    let result = repo.save(&mut customer).await;

    // Assert
    assert!(result.is_ok());
    assert_eq!(store.saved_snapshots().len(), 1);
    assert_eq!(repo.get_version("cust-4").await.unwrap(), 1);

    let loaded = repo.find_by_id("cust-4").await.unwrap().unwrap();
    assert_eq!(loaded.name(), "Ada B");
}

#[tokio::test]
async fn test_unregistered_event_type_fails_hydration() {
    // Arrange
    let store = Arc::new(RecordingEventStore::new());
    store
        .inner()
        .append(
            "cust-5",
            "Customer",
            vec![PendingEvent {
                event_type: "CustomerMerged".to_owned(),
                payload: "{}".to_owned(),
                occurred_at: clock().0,
                metadata: None,
            }],
            -1,
        )
        .await
        .unwrap();
    let repo = customer_repository(store.clone(), 0);

    // Act
    let result = repo.find_by_id("cust-5").await;

    // Assert
    match result {
        Err(DomainError::Serialization(SerializationError::UnknownEventType(name))) => {
            assert_eq!(name, "CustomerMerged");
        }
        other => panic!("expected UnknownEventType, got {:?}", other.map(|c| c.is_some())),
    }
}

#[tokio::test]
async fn test_save_with_metadata_stores_encoded_map_on_every_event() {
    // Arrange
    let store = Arc::new(InMemoryEventStore::new());
    let repo = customer_repository(store.clone(), 0);
    let mut customer = new_customer("cust-6", "Ada");
    customer.rename("Ada B", &clock()).unwrap();
    let metadata = HashMap::from([
        ("correlationId".to_owned(), "corr-42".to_owned()),
        ("userId".to_owned(), "admin".to_owned()),
    ]);

    // Act
    repo.save_with_metadata(&mut customer, &metadata)
        .await
        .unwrap();

    // Assert
    let serializer = customer_serializer();
    let stored = store.get_events("cust-6").await.unwrap();
    assert_eq!(stored.len(), 2);
    for event in &stored {
        let decoded = serializer
            .deserialize_metadata(event.metadata.as_deref())
            .unwrap();
        assert_eq!(decoded, metadata);
    }
}

#[tokio::test]
async fn test_saved_events_reach_notification_sink() {
    // Arrange
    let sink = Arc::new(RecordingNotificationSink::new());
    let store = Arc::new(InMemoryEventStore::new().with_notification_sink(sink.clone()));
    let repo = customer_repository(store, 0);
    let mut customer = new_customer("cust-7", "Ada");
    customer.rename("Ada B", &clock()).unwrap();

    // Act
    repo.save(&mut customer).await.unwrap();

    // Assert
    let published = sink.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].event_type, "CustomerCreated");
    assert_eq!(published[1].event_type, "CustomerRenamed");
    assert_eq!(published[1].version, 1);
}

#[tokio::test]
async fn test_failing_notification_sink_does_not_fail_save() {
    let store = Arc::new(
        InMemoryEventStore::new().with_notification_sink(Arc::new(FailingNotificationSink)),
    );
    let repo = customer_repository(store.clone(), 0);
    let mut customer = new_customer("cust-8", "Ada");

    let result = repo.save(&mut customer).await;

    assert!(result.is_ok());
    assert!(!customer.has_uncommitted_events());
    assert!(store.exists("cust-8").await.unwrap());
}

#[tokio::test]
async fn test_first_save_snapshots_version_zero_with_frequency_one() {
    // Arrange
    let store = Arc::new(RecordingEventStore::new());
    let repo = customer_repository(store.clone(), 1);
    let mut customer = new_customer("cust-9", "Ada");

    // Act
    repo.save(&mut customer).await.unwrap();

    // Assert
    let snapshots = store.saved_snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].version, 0);

    let loaded = repo.find_by_id("cust-9").await.unwrap().unwrap();
    assert_eq!(loaded.version(), 0);
    assert_eq!(loaded.name(), "Ada");
    assert_eq!(store.get_events_calls(), 0);
}

#[tokio::test]
async fn test_snapshots_are_stamped_by_the_injected_clock() {
    // Arrange
    let store = Arc::new(RecordingEventStore::new());
    let stamp = Utc.with_ymd_and_hms(2030, 6, 1, 12, 30, 0).unwrap();
    let repo = AggregateRepository::new(
        store.clone(),
        Arc::new(customer_serializer()),
        AGGREGATE_TYPE,
        Customer::new,
    )
    .with_snapshot_frequency(2)
    .with_clock(Arc::new(FixedClock(stamp)));
    let mut customer = new_customer("cust-10", "Ada");
    customer.rename("Ada B", &clock()).unwrap();
    customer.rename("Ada C", &clock()).unwrap();

    // Act
    repo.save(&mut customer).await.unwrap();

    // Assert
    let snapshots = store.saved_snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].created_at, stamp);
}
