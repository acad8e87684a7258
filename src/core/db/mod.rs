/// Database Module
///
/// This module provides the database layer of TABQL, split into three
/// concerns:
/// - **Connection Management** (`connection.rs`): obtains and releases the single live connection
/// - **Schema** (`schema.rs`): column/table model and live-table introspection
/// - **Query Execution** (`query.rs`): the gateway every statement passes through
///
/// ## Error Handling
///
/// All database operations use the standardized `TabqlError` type. Driver
/// errors are converted inside the gateway.
pub mod connection;
pub mod query;
pub mod schema;

pub use connection::*;
pub use query::*;
pub use schema::*;
