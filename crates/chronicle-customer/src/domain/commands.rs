//! Commands for the Customer context.

use uuid::Uuid;

/// Command to create a new customer.
#[derive(Debug, Clone)]
pub struct CreateCustomer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The customer identifier.
    pub customer_id: String,
    /// The customer's name.
    pub name: String,
    /// The customer's email address.
    pub email: String,
}

/// Command to rename a customer.
#[derive(Debug, Clone)]
pub struct RenameCustomer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The customer identifier.
    pub customer_id: String,
    /// The new name.
    pub name: String,
}

/// Command to change a customer's email address.
#[derive(Debug, Clone)]
pub struct ChangeCustomerEmail {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The customer identifier.
    pub customer_id: String,
    /// The new email address.
    pub email: String,
}

/// Command to attach a support note to a customer.
#[derive(Debug, Clone)]
pub struct AddCustomerNote {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The customer identifier.
    pub customer_id: String,
    /// The note text.
    pub text: String,
}

/// Command to deactivate a customer.
#[derive(Debug, Clone)]
pub struct DeactivateCustomer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The customer identifier.
    pub customer_id: String,
    /// Why the customer is deactivated.
    pub reason: String,
}
