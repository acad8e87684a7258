/// TABQL Error Module
///
/// This module defines the error taxonomy for tabql. Every failure that can
/// leave an operation is one of these variants; driver faults are converted
/// at the execution gateway and never escape as raw `rusqlite` errors.
use thiserror::Error;

/// Schema-level failures. The operation is aborted and nothing is applied.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// No inference rule matches the column name
    #[error("unrecognized column '{0}': no type rule matches")]
    UnrecognizedColumn(String),

    /// A table definition without columns
    #[error("table '{0}' has no columns")]
    EmptySchema(String),

    /// The table does not exist in the live database
    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    /// An identifier rejected by the quoting rules
    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: &'static str },

    /// More than one column flagged as primary key
    #[error("table '{0}' declares more than one primary key")]
    MultiplePrimaryKeys(String),

    /// A row field whose name is not a column of the live table
    #[error("column '{column}' is not part of table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// A live column whose declared type has no storage-type mapping
    #[error("column '{column}' has unsupported declared type '{declared}'")]
    UnsupportedType { column: String, declared: String },
}

/// Comprehensive error type for tabql.
///
/// - Connection failures (fatal to the current handle, never retried)
/// - Schema failures (see [`SchemaError`])
/// - Row shape and value failures (whole batch rejected before execution)
/// - Driver faults reported by the execution gateway
/// - Configuration and file-system failures of the glue layer
#[derive(Error, Debug)]
pub enum TabqlError {
    /// Opening, creating or closing a database failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// An operation was issued on a handle without a live connection
    #[error("Not connected: no live database connection")]
    NotConnected,

    /// Schema-related errors
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A row whose field count differs from the schema's column count
    #[error("Arity mismatch: row {row} has {found} fields, expected {expected}")]
    ArityMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A raw value that cannot be stored in its column
    #[error("Value mismatch: row {row}, column '{column}': '{value}' is not a valid {expected}")]
    ValueMismatch {
        row: usize,
        column: String,
        value: String,
        expected: String,
    },

    /// Driver-reported fault during execution
    #[error("Execution error: {message}")]
    Execution { message: String },

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON rendering errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TabqlError {
    /// Wraps a driver error as an execution failure carrying its message.
    pub fn execution(err: rusqlite::Error) -> Self {
        TabqlError::Execution {
            message: err.to_string(),
        }
    }
}

/// Type alias for Result to use TabqlError as the error type.
pub type Result<T> = std::result::Result<T, TabqlError>;

/// Type alias for shell command results: an optional message to print on success
pub type CommandResult = Result<Option<String>>;
