/// Core Module for TABQL
///
/// This module contains the database-facing infrastructure: the connection
/// provider, the execution gateway, the schema model with its introspector,
/// and the shared error type.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{CommandResult, Result, SchemaError, TabqlError};
