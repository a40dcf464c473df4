//! Aggregate roots for the Customer context.

use chronicle_core::aggregate::{AggregateRoot, AggregateState};
use chronicle_core::clock::Clock;
use chronicle_core::error::DomainError;
use serde::{Deserialize, Serialize};

use super::events::{
    CustomerCreated, CustomerDeactivated, CustomerEmailChanged, CustomerEvent, CustomerNoteAdded,
    CustomerRenamed,
};

/// The aggregate root for a customer.
#[derive(Debug, Default)]
pub struct Customer {
    state: AggregateState<CustomerEvent>,
    /// The customer's name.
    pub(crate) name: String,
    /// The customer's email address.
    pub(crate) email: String,
    /// Whether the customer is active.
    pub(crate) active: bool,
    /// Number of support notes attached.
    pub(crate) note_count: u32,
}

/// Snapshot shape of [`Customer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
    /// The customer's name.
    pub name: String,
    /// The customer's email address.
    pub email: String,
    /// Whether the customer is active.
    pub active: bool,
    /// Number of support notes attached.
    pub note_count: u32,
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::Validation(
            "customer name must not be empty".into(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), DomainError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(DomainError::Validation(format!(
            "invalid email address: {email}"
        ))),
    }
}

impl Customer {
    /// Creates an empty customer, ready to be created or reconstituted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the customer's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the customer's email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns `true` unless the customer has been deactivated.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the number of support notes.
    #[must_use]
    pub fn note_count(&self) -> u32 {
        self.note_count
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if self.version() < 0 {
            return Err(DomainError::Validation("customer has not been created".into()));
        }
        if !self.active {
            return Err(DomainError::Validation(format!(
                "customer {} is deactivated",
                self.aggregate_id()
            )));
        }
        Ok(())
    }

    /// Creates the customer, producing a `CustomerCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the customer already exists or
    /// the name or email is invalid.
    pub fn create(
        &mut self,
        id: &str,
        name: &str,
        email: &str,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.version() >= 0 {
            return Err(DomainError::Validation(format!(
                "customer {} already exists",
                self.aggregate_id()
            )));
        }
        if id.trim().is_empty() {
            return Err(DomainError::Validation("customer id must not be empty".into()));
        }
        validate_name(name)?;
        validate_email(email)?;

        self.raise_event(
            CustomerCreated {
                aggregate_id: id.to_owned(),
                occurred_at: clock.now(),
                name: name.to_owned(),
                email: email.to_owned(),
            }
            .into(),
        );
        Ok(())
    }

    /// Renames the customer, producing a `CustomerRenamed` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the customer is not active or the
    /// name is empty.
    pub fn rename(&mut self, name: &str, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_active()?;
        validate_name(name)?;

        let event = CustomerRenamed {
            aggregate_id: self.aggregate_id().to_owned(),
            occurred_at: clock.now(),
            name: name.to_owned(),
        };
        self.raise_event(event.into());
        Ok(())
    }

    /// Changes the email address, producing a `CustomerEmailChanged` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the customer is not active or the
    /// address is malformed.
    pub fn change_email(&mut self, email: &str, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_active()?;
        validate_email(email)?;

        let event = CustomerEmailChanged {
            aggregate_id: self.aggregate_id().to_owned(),
            occurred_at: clock.now(),
            email: email.to_owned(),
        };
        self.raise_event(event.into());
        Ok(())
    }

    /// Attaches a support note, producing a `CustomerNoteAdded` event.
    /// Notes may be added to deactivated customers.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the customer does not exist or
    /// the note is empty.
    pub fn add_note(&mut self, text: &str, clock: &dyn Clock) -> Result<(), DomainError> {
        if self.version() < 0 {
            return Err(DomainError::Validation("customer has not been created".into()));
        }
        if text.trim().is_empty() {
            return Err(DomainError::Validation("note must not be empty".into()));
        }

        let event = CustomerNoteAdded {
            aggregate_id: self.aggregate_id().to_owned(),
            occurred_at: clock.now(),
            text: text.to_owned(),
        };
        self.raise_event(event.into());
        Ok(())
    }

    /// Deactivates the customer, producing a `CustomerDeactivated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the customer is not active.
    pub fn deactivate(&mut self, reason: &str, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_active()?;

        let event = CustomerDeactivated {
            aggregate_id: self.aggregate_id().to_owned(),
            occurred_at: clock.now(),
            reason: reason.to_owned(),
        };
        self.raise_event(event.into());
        Ok(())
    }
}

impl AggregateRoot for Customer {
    type Event = CustomerEvent;
    type Snapshot = CustomerSnapshot;

    fn state(&self) -> &AggregateState<CustomerEvent> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AggregateState<CustomerEvent> {
        &mut self.state
    }

    fn apply(&mut self, event: &CustomerEvent) {
        match event {
            CustomerEvent::CustomerCreated(payload) => {
                self.name.clone_from(&payload.name);
                self.email.clone_from(&payload.email);
                self.active = true;
            }
            CustomerEvent::CustomerRenamed(payload) => {
                self.name.clone_from(&payload.name);
            }
            CustomerEvent::CustomerEmailChanged(payload) => {
                self.email.clone_from(&payload.email);
            }
            // Note text is kept in the event log only.
            CustomerEvent::CustomerNoteAdded(_) => {
                self.note_count += 1;
            }
            CustomerEvent::CustomerDeactivated(_) => {
                self.active = false;
            }
        }
    }

    fn create_snapshot(&self) -> CustomerSnapshot {
        CustomerSnapshot {
            name: self.name.clone(),
            email: self.email.clone(),
            active: self.active,
            note_count: self.note_count,
        }
    }

    fn restore_from_snapshot(&mut self, snapshot: CustomerSnapshot) {
        self.name = snapshot.name;
        self.email = snapshot.email;
        self.active = snapshot.active;
        self.note_count = snapshot.note_count;
    }
}
