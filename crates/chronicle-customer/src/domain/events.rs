//! Domain events for the Customer context.

use chrono::{DateTime, Utc};
use chronicle_core::event::DomainEvent;
use chronicle_core::serializer::{EventSerializer, EventTypeRegistry};
use serde::{Deserialize, Serialize};

/// Event type name of [`CustomerCreated`].
pub const CUSTOMER_CREATED: &str = "CustomerCreated";
/// Event type name of [`CustomerRenamed`].
pub const CUSTOMER_RENAMED: &str = "CustomerRenamed";
/// Event type name of [`CustomerEmailChanged`].
pub const CUSTOMER_EMAIL_CHANGED: &str = "CustomerEmailChanged";
/// Event type name of [`CustomerNoteAdded`].
pub const CUSTOMER_NOTE_ADDED: &str = "CustomerNoteAdded";
/// Event type name of [`CustomerDeactivated`].
pub const CUSTOMER_DEACTIVATED: &str = "CustomerDeactivated";

/// Emitted when a customer is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerCreated {
    /// The customer identifier.
    pub aggregate_id: String,
    /// When the customer was created.
    pub occurred_at: DateTime<Utc>,
    /// The customer's name.
    pub name: String,
    /// The customer's email address.
    pub email: String,
}

/// Emitted when a customer is renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRenamed {
    /// The customer identifier.
    pub aggregate_id: String,
    /// When the rename happened.
    pub occurred_at: DateTime<Utc>,
    /// The new name.
    pub name: String,
}

/// Emitted when a customer's email address changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerEmailChanged {
    /// The customer identifier.
    pub aggregate_id: String,
    /// When the change happened.
    pub occurred_at: DateTime<Utc>,
    /// The new email address.
    pub email: String,
}

/// Emitted when a support note is attached to a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerNoteAdded {
    /// The customer identifier.
    pub aggregate_id: String,
    /// When the note was added.
    pub occurred_at: DateTime<Utc>,
    /// The note text.
    pub text: String,
}

/// Emitted when a customer is deactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDeactivated {
    /// The customer identifier.
    pub aggregate_id: String,
    /// When the customer was deactivated.
    pub occurred_at: DateTime<Utc>,
    /// Why the customer was deactivated.
    pub reason: String,
}

/// The closed set of events of the `Customer` aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum CustomerEvent {
    /// A customer has been created.
    CustomerCreated(CustomerCreated),
    /// A customer has been renamed.
    CustomerRenamed(CustomerRenamed),
    /// A customer's email address has changed.
    CustomerEmailChanged(CustomerEmailChanged),
    /// A note has been added to a customer.
    CustomerNoteAdded(CustomerNoteAdded),
    /// A customer has been deactivated.
    CustomerDeactivated(CustomerDeactivated),
}

impl From<CustomerCreated> for CustomerEvent {
    fn from(event: CustomerCreated) -> Self {
        Self::CustomerCreated(event)
    }
}

impl From<CustomerRenamed> for CustomerEvent {
    fn from(event: CustomerRenamed) -> Self {
        Self::CustomerRenamed(event)
    }
}

impl From<CustomerEmailChanged> for CustomerEvent {
    fn from(event: CustomerEmailChanged) -> Self {
        Self::CustomerEmailChanged(event)
    }
}

impl From<CustomerNoteAdded> for CustomerEvent {
    fn from(event: CustomerNoteAdded) -> Self {
        Self::CustomerNoteAdded(event)
    }
}

impl From<CustomerDeactivated> for CustomerEvent {
    fn from(event: CustomerDeactivated) -> Self {
        Self::CustomerDeactivated(event)
    }
}

impl DomainEvent for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::CustomerCreated(_) => CUSTOMER_CREATED,
            Self::CustomerRenamed(_) => CUSTOMER_RENAMED,
            Self::CustomerEmailChanged(_) => CUSTOMER_EMAIL_CHANGED,
            Self::CustomerNoteAdded(_) => CUSTOMER_NOTE_ADDED,
            Self::CustomerDeactivated(_) => CUSTOMER_DEACTIVATED,
        }
    }

    fn aggregate_id(&self) -> &str {
        match self {
            Self::CustomerCreated(e) => &e.aggregate_id,
            Self::CustomerRenamed(e) => &e.aggregate_id,
            Self::CustomerEmailChanged(e) => &e.aggregate_id,
            Self::CustomerNoteAdded(e) => &e.aggregate_id,
            Self::CustomerDeactivated(e) => &e.aggregate_id,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::CustomerCreated(e) => e.occurred_at,
            Self::CustomerRenamed(e) => e.occurred_at,
            Self::CustomerEmailChanged(e) => e.occurred_at,
            Self::CustomerNoteAdded(e) => e.occurred_at,
            Self::CustomerDeactivated(e) => e.occurred_at,
        }
    }
}

/// Registers every Customer event type. Call once at startup, before any
/// customer is loaded.
pub fn register_customer_events(registry: &mut EventTypeRegistry<CustomerEvent>) {
    registry.register::<CustomerCreated>(CUSTOMER_CREATED);
    registry.register::<CustomerRenamed>(CUSTOMER_RENAMED);
    registry.register::<CustomerEmailChanged>(CUSTOMER_EMAIL_CHANGED);
    registry.register::<CustomerNoteAdded>(CUSTOMER_NOTE_ADDED);
    registry.register::<CustomerDeactivated>(CUSTOMER_DEACTIVATED);
}

/// Builds a serializer that knows every Customer event type.
#[must_use]
pub fn customer_serializer() -> EventSerializer<CustomerEvent> {
    let mut serializer = EventSerializer::new();
    register_customer_events(serializer.registry_mut());
    serializer
}
