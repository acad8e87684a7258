//! Identifier quoting.
//!
//! Table and column names cannot be bound as parameters, so they are embedded
//! in statement text. This module is the only place that turns a name into a
//! SQL fragment; every other module goes through [`quote`], [`quote_column`]
//! or [`quote_column_ref`].

use crate::core::{Result, SchemaError};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Words rejected as identifiers even though quoting would make them legal.
static RESERVED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "ADD", "ALL", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLLATE",
        "COLUMN", "COMMIT", "CONSTRAINT", "CREATE", "CROSS", "CURRENT_DATE", "CURRENT_TIME",
        "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT", "DEFERRABLE", "DELETE", "DESC", "DISTINCT",
        "DROP", "ELSE", "ESCAPE", "EXCEPT", "EXISTS", "FOREIGN", "FROM", "FULL", "GLOB", "GROUP",
        "HAVING", "IN", "INDEX", "INNER", "INSERT", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
        "LEFT", "LIKE", "LIMIT", "NATURAL", "NOT", "NOTNULL", "NULL", "OFFSET", "ON", "OR",
        "ORDER", "OUTER", "PRAGMA", "PRIMARY", "REFERENCES", "RIGHT", "ROLLBACK", "SELECT", "SET",
        "TABLE", "THEN", "TO", "TRANSACTION", "TRUNCATE", "UNION", "UNIQUE", "UPDATE", "USING",
        "VALUES", "WHEN", "WHERE", "WITH",
    ]
    .into_iter()
    .collect()
});

fn invalid(name: &str, reason: &'static str) -> SchemaError {
    SchemaError::InvalidIdentifier {
        name: name.to_string(),
        reason,
    }
}

/// Checks a single identifier without quoting it.
pub fn validate(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(invalid(name, "empty").into());
    }
    if name.contains(';') {
        return Err(invalid(name, "contains a statement terminator").into());
    }
    if name.chars().any(char::is_control) {
        return Err(invalid(name, "contains a control character").into());
    }
    if RESERVED.contains(name.trim().to_uppercase().as_str()) {
        return Err(invalid(name, "is a reserved keyword").into());
    }
    Ok(())
}

/// Quotes one identifier, doubling any embedded double quote.
///
/// ```
/// assert_eq!(tabql::ident::quote("orders").unwrap(), "\"orders\"");
/// ```
pub fn quote(name: &str) -> Result<String> {
    validate(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quotes a column name for a table definition. Column names may not contain
/// `.`, which column references use to qualify a name with its table.
pub fn quote_column(name: &str) -> Result<String> {
    if name.contains('.') {
        return Err(invalid(name, "contains '.', which separates table and column").into());
    }
    quote(name)
}

/// Quotes a column reference that may be qualified by a table (`table.column`).
/// Each part is validated and quoted separately.
pub fn quote_column_ref(reference: &str) -> Result<String> {
    match reference.split_once('.') {
        Some((table, column)) => Ok(format!("{}.{}", quote(table)?, quote(column)?)),
        None => quote(reference),
    }
}
