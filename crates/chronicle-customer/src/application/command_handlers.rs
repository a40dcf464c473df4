//! Command handlers for the Customer context.
//!
//! Each handler loads the aggregate through the repository, runs the domain
//! method and saves the new events with the command's correlation ID as
//! metadata. Concurrency conflicts are returned to the caller, which owns
//! the retry policy.

use std::collections::HashMap;
use std::sync::Arc;

use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::clock::Clock;
use chronicle_core::error::DomainError;
use chronicle_core::repository::AggregateRepository;
use chronicle_core::store::EventStore;
use uuid::Uuid;

use crate::domain::aggregates::Customer;
use crate::domain::commands::{
    AddCustomerNote, ChangeCustomerEmail, CreateCustomer, DeactivateCustomer, RenameCustomer,
};
use crate::domain::events::customer_serializer;

/// Aggregate type name stored with every customer event.
pub const AGGREGATE_TYPE: &str = "Customer";

/// Metadata key carrying the command's correlation ID.
pub const CORRELATION_ID_KEY: &str = "correlationId";

/// Repository for `Customer` aggregates.
pub type CustomerRepository = AggregateRepository<Customer>;

/// Builds a customer repository on top of `store`. A `snapshot_frequency`
/// of zero disables snapshots.
#[must_use]
pub fn customer_repository(
    store: Arc<dyn EventStore>,
    snapshot_frequency: u32,
) -> CustomerRepository {
    AggregateRepository::new(
        store,
        Arc::new(customer_serializer()),
        AGGREGATE_TYPE,
        Customer::new,
    )
    .with_snapshot_frequency(snapshot_frequency)
}

fn correlation_metadata(correlation_id: Uuid) -> HashMap<String, String> {
    HashMap::from([(CORRELATION_ID_KEY.to_owned(), correlation_id.to_string())])
}

/// Loads a customer, mapping absence to `DomainError::AggregateNotFound`.
pub(crate) async fn load(
    repo: &CustomerRepository,
    customer_id: &str,
) -> Result<Customer, DomainError> {
    repo.find_by_id(customer_id)
        .await?
        .ok_or_else(|| DomainError::AggregateNotFound(customer_id.to_owned()))
}

async fn save(
    repo: &CustomerRepository,
    customer: &mut Customer,
    correlation_id: Uuid,
) -> Result<i64, DomainError> {
    repo.save_with_metadata(customer, &correlation_metadata(correlation_id))
        .await?;
    Ok(customer.version())
}

/// Handles the `CreateCustomer` command and returns the new version.
///
/// # Errors
///
/// Returns `DomainError::Validation` for invalid input and
/// `DomainError::ConcurrencyConflict` if the customer already exists.
#[tracing::instrument(
    skip_all,
    fields(customer_id = %command.customer_id, correlation_id = %command.correlation_id)
)]
pub async fn handle_create_customer(
    command: &CreateCustomer,
    clock: &dyn Clock,
    repo: &CustomerRepository,
) -> Result<i64, DomainError> {
    let mut customer = Customer::new();
    customer.create(&command.customer_id, &command.name, &command.email, clock)?;
    save(repo, &mut customer, command.correlation_id).await
}

/// Handles the `RenameCustomer` command and returns the new version.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the customer does not exist,
/// `DomainError::Validation` for invalid input, or any load/save error.
#[tracing::instrument(
    skip_all,
    fields(customer_id = %command.customer_id, correlation_id = %command.correlation_id)
)]
pub async fn handle_rename_customer(
    command: &RenameCustomer,
    clock: &dyn Clock,
    repo: &CustomerRepository,
) -> Result<i64, DomainError> {
    let mut customer = load(repo, &command.customer_id).await?;
    customer.rename(&command.name, clock)?;
    save(repo, &mut customer, command.correlation_id).await
}

/// Handles the `ChangeCustomerEmail` command and returns the new version.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the customer does not exist,
/// `DomainError::Validation` for invalid input, or any load/save error.
#[tracing::instrument(
    skip_all,
    fields(customer_id = %command.customer_id, correlation_id = %command.correlation_id)
)]
pub async fn handle_change_customer_email(
    command: &ChangeCustomerEmail,
    clock: &dyn Clock,
    repo: &CustomerRepository,
) -> Result<i64, DomainError> {
    let mut customer = load(repo, &command.customer_id).await?;
    customer.change_email(&command.email, clock)?;
    save(repo, &mut customer, command.correlation_id).await
}

/// Handles the `AddCustomerNote` command and returns the new version.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the customer does not exist,
/// `DomainError::Validation` for an empty note, or any load/save error.
#[tracing::instrument(
    skip_all,
    fields(customer_id = %command.customer_id, correlation_id = %command.correlation_id)
)]
pub async fn handle_add_customer_note(
    command: &AddCustomerNote,
    clock: &dyn Clock,
    repo: &CustomerRepository,
) -> Result<i64, DomainError> {
    let mut customer = load(repo, &command.customer_id).await?;
    customer.add_note(&command.text, clock)?;
    save(repo, &mut customer, command.correlation_id).await
}

/// Handles the `DeactivateCustomer` command and returns the new version.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the customer does not exist,
/// `DomainError::Validation` if it is already deactivated, or any load/save
/// error.
#[tracing::instrument(
    skip_all,
    fields(customer_id = %command.customer_id, correlation_id = %command.correlation_id)
)]
pub async fn handle_deactivate_customer(
    command: &DeactivateCustomer,
    clock: &dyn Clock,
    repo: &CustomerRepository,
) -> Result<i64, DomainError> {
    let mut customer = load(repo, &command.customer_id).await?;
    customer.deactivate(&command.reason, clock)?;
    save(repo, &mut customer, command.correlation_id).await
}
