//! `PostgreSQL` persistence for the Chronicle event-sourcing core.
//!
//! Provides the `EventStore` implementation backed by `sqlx`, an in-process
//! broadcast notification sink and environment-driven configuration.

pub mod broadcast;
pub mod config;
pub mod pg_event_store;

/// Embedded schema migrations for the `events` and `snapshots` tables.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");
