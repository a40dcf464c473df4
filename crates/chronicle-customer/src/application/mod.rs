//! Application services of the Customer context.

pub mod command_handlers;
pub mod query_handlers;
