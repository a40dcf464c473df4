//! Query handlers for the Customer context.
//!
//! This module contains query handlers that reconstitute aggregates
//! through the repository and return read-only view DTOs.

use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::error::DomainError;
use serde::Serialize;

use crate::application::command_handlers::{self, CustomerRepository};

/// Read-only view of a customer aggregate.
#[derive(Debug, Serialize)]
pub struct CustomerView {
    /// The customer identifier.
    pub customer_id: String,
    /// The customer's name.
    pub name: String,
    /// The customer's email address.
    pub email: String,
    /// Whether the customer is active.
    pub active: bool,
    /// Number of support notes attached.
    pub note_count: u32,
    /// Current version (last applied event).
    pub version: i64,
}

/// Retrieves a customer by its aggregate ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID.
/// Returns `DomainError::Serialization` if a stored event cannot be decoded.
pub async fn get_customer_by_id(
    customer_id: &str,
    repo: &CustomerRepository,
) -> Result<CustomerView, DomainError> {
    let customer = command_handlers::load(repo, customer_id).await?;
    Ok(CustomerView {
        customer_id: customer.aggregate_id().to_owned(),
        name: customer.name().to_owned(),
        email: customer.email().to_owned(),
        active: customer.is_active(),
        note_count: customer.note_count(),
        version: customer.version(),
    })
}
