//! Chronicle Core — the event-sourcing core.
//!
//! This crate defines the event log and snapshot abstractions, the
//! event-sourced aggregate base trait, the event serializer and the
//! aggregate repository that ties them together. The only storage backend
//! here is the in-memory one; `PostgreSQL` lives in `chronicle-event-store`.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod event;
pub mod memory_store;
pub mod repository;
pub mod serializer;
pub mod store;
