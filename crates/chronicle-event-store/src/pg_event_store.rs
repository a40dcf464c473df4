//! `PostgreSQL` implementation of the `EventStore` trait.
//!
//! Appends run in one transaction. A transaction-scoped advisory lock keyed
//! by the aggregate id serializes writers of the same stream, and the
//! `(aggregate_id, version)` unique constraint rejects anything that slips
//! past it (e.g. a writer not going through this type).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_core::error::DomainError;
use chronicle_core::event::{PendingEvent, Snapshot, StoredEvent};
use chronicle_core::store::{EventStore, NotificationSink, publish_all};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const SELECT_EVENTS: &str = r"
SELECT event_id, aggregate_id, aggregate_type, event_type, version, payload, metadata, occurred_at
FROM events
";

/// PostgreSQL-backed event store.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl PgEventStore {
    /// Creates a new `PgEventStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool, sink: None }
    }

    /// Publishes every committed event to `sink`.
    #[must_use]
    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl fmt::Debug for PgEventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgEventStore")
            .field("pool", &self.pool)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: Uuid,
    aggregate_id: String,
    aggregate_type: String,
    event_type: String,
    version: i64,
    payload: String,
    metadata: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            aggregate_id: row.aggregate_id,
            aggregate_type: row.aggregate_type,
            event_type: row.event_type,
            version: row.version,
            payload: row.payload,
            occurred_at: row.occurred_at,
            metadata: row.metadata,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    aggregate_id: String,
    aggregate_type: String,
    version: i64,
    state: String,
    created_at: DateTime<Utc>,
}

impl From<SnapshotRow> for Snapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            aggregate_id: row.aggregate_id,
            aggregate_type: row.aggregate_type,
            version: row.version,
            state: row.state,
            created_at: row.created_at,
        }
    }
}

fn storage_error(err: sqlx::Error) -> DomainError {
    DomainError::infrastructure(err)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

async fn current_version<'c, E>(executor: E, aggregate_id: &str) -> Result<i64, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    sqlx::query_scalar("SELECT COALESCE(MAX(version), -1) FROM events WHERE aggregate_id = $1")
        .bind(aggregate_id)
        .fetch_one(executor)
        .await
}

#[async_trait]
impl EventStore for PgEventStore {
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

        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(aggregate_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        let actual = current_version(&mut *tx, aggregate_id)
            .await
            .map_err(storage_error)?;
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

        let inserted = {
            let mut qb = QueryBuilder::<Postgres>::new(
                "INSERT INTO events \
                 (event_id, aggregate_id, aggregate_type, event_type, version, payload, metadata, occurred_at) ",
            );
            qb.push_values(&stored, |mut b, event| {
                b.push_bind(event.event_id)
                    .push_bind(event.aggregate_id.as_str())
                    .push_bind(event.aggregate_type.as_str())
                    .push_bind(event.event_type.as_str())
                    .push_bind(event.version)
                    .push_bind(event.payload.as_str())
                    .push_bind(event.metadata.as_deref())
                    .push_bind(event.occurred_at);
            });
            qb.build().execute(&mut *tx).await
        };

        if let Err(err) = inserted {
            if is_unique_violation(&err) {
                drop(tx);
                let actual = current_version(&self.pool, aggregate_id)
                    .await
                    .map_err(storage_error)?;
                tracing::debug!(actual, "lost append race on unique constraint");
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id: aggregate_id.to_owned(),
                    expected: expected_version,
                    actual,
                });
            }
            return Err(storage_error(err));
        }

        tx.commit().await.map_err(storage_error)?;
        tracing::debug!("events appended to stream");

        if let Some(sink) = &self.sink {
            publish_all(sink.as_ref(), &stored).await;
        }
        Ok(stored)
    }

    async fn get_events(&self, aggregate_id: &str) -> Result<Vec<StoredEvent>, DomainError> {
        let rows: Vec<EventRow> =
            sqlx::query_as(&format!("{SELECT_EVENTS} WHERE aggregate_id = $1 ORDER BY version ASC"))
                .bind(aggregate_id)
                .fetch_all(&self.pool)
                .await
                .map_err(storage_error)?;
        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }

    async fn get_events_from(
        &self,
        aggregate_id: &str,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "{SELECT_EVENTS} WHERE aggregate_id = $1 AND version > $2 ORDER BY version ASC"
        ))
        .bind(aggregate_id)
        .bind(from_version)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }

    async fn get_current_version(&self, aggregate_id: &str) -> Result<i64, DomainError> {
        current_version(&self.pool, aggregate_id)
            .await
            .map_err(storage_error)
    }

    async fn exists(&self, aggregate_id: &str) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM events WHERE aggregate_id = $1)")
            .bind(aggregate_id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)
    }

    #[tracing::instrument(
        skip(self, snapshot),
        fields(aggregate_id = %snapshot.aggregate_id, version = snapshot.version)
    )]
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO snapshots (snapshot_id, aggregate_id, aggregate_type, version, state, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(Uuid::now_v7())
        .bind(&snapshot.aggregate_id)
        .bind(&snapshot.aggregate_type)
        .bind(snapshot.version)
        .bind(&snapshot.state)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        tracing::debug!("snapshot saved");
        Ok(())
    }

    async fn get_latest_snapshot(
        &self,
        aggregate_id: &str,
    ) -> Result<Option<Snapshot>, DomainError> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            r"
            SELECT aggregate_id, aggregate_type, version, state, created_at
            FROM snapshots
            WHERE aggregate_id = $1
            ORDER BY version DESC, created_at DESC
            LIMIT 1
            ",
        )
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(row.map(Snapshot::from))
    }
}
