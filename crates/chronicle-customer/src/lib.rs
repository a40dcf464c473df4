//! Chronicle — Customer bounded context.
//!
//! A sample event-sourced context: customer creation, renames, email
//! changes, support notes and deactivation, persisted through the
//! aggregate repository of `chronicle-core`.

pub mod application;
pub mod domain;
