/// Schema Module
///
/// This module holds the column and table model shared by the inferencer and
/// the statement builder, and the introspector that reads a live table's
/// definition back from SQLite. Introspection results are never cached: every
/// call re-reads the catalog.

use super::query::{Bindings, Gateway, Statement};
use crate::core::{Result, SchemaError};
use rusqlite::types::Value;
use std::fmt;
use tracing::debug;

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    /// Variable-length text with a maximum length in characters
    VarChar(u32),
    /// Fixed-point number with precision and scale
    Decimal(u8, u8),
    DateTime,
}

impl ColumnType {
    /// Parses a declared SQL type as reported by the catalog.
    ///
    /// Returns `None` for types tabql never declares.
    pub fn parse_declared(declared: &str) -> Option<Self> {
        let compact: String = declared
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();

        if compact == "INTEGER" || compact == "INT" {
            return Some(ColumnType::Integer);
        }
        if compact == "DATETIME" {
            return Some(ColumnType::DateTime);
        }
        if let Some(args) = type_arguments(&compact, "VARCHAR") {
            return args.parse().ok().map(ColumnType::VarChar);
        }
        if let Some(args) = type_arguments(&compact, "DECIMAL") {
            let (precision, scale) = args.split_once(',')?;
            return Some(ColumnType::Decimal(
                precision.parse().ok()?,
                scale.parse().ok()?,
            ));
        }
        None
    }
}

fn type_arguments<'a>(compact: &'a str, name: &str) -> Option<&'a str> {
    compact.strip_prefix(name)?.strip_prefix('(')?.strip_suffix(')')
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Integer => write!(f, "INTEGER"),
            ColumnType::VarChar(len) => write!(f, "VARCHAR({})", len),
            ColumnType::Decimal(precision, scale) => write!(f, "DECIMAL({},{})", precision, scale),
            ColumnType::DateTime => write!(f, "DATETIME"),
        }
    }
}

/// Target of a foreign reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignRef {
    /// The referenced table
    pub table: String,
    /// The referenced column; `None` means the referenced table's primary key
    pub column: Option<String>,
}

/// One column of a table definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Storage type
    pub column_type: ColumnType,
    /// Whether NULL is rejected
    pub not_null: bool,
    /// Whether this column is the table's primary key
    pub is_primary_key: bool,
    /// Whether this column refers to another table
    pub is_foreign_key: bool,
    /// Referenced table and column, when known
    pub references: Option<ForeignRef>,
}

impl ColumnSpec {
    /// A NOT NULL column without key constraints.
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        ColumnSpec {
            name: name.to_string(),
            column_type,
            not_null: true,
            is_primary_key: false,
            is_foreign_key: false,
            references: None,
        }
    }

    /// Marks the column as the primary key.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.not_null = true;
        self
    }

    /// Marks the column as a foreign key, optionally naming its target.
    pub fn foreign_key(mut self, references: Option<ForeignRef>) -> Self {
        self.is_foreign_key = true;
        self.references = references;
        self
    }
}

/// Ordered column definitions of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name
    pub table: String,
    /// Columns in table order
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in table order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of a column, compared case-insensitively as SQLite does
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The primary key column, if any
    pub fn primary_key(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.is_primary_key)
    }
}

/// Reads the live definition of `table`.
///
/// # Errors
///
/// `SchemaError::TableNotFound` when the table does not exist,
/// `SchemaError::UnsupportedType` when a column's declared type has no
/// storage-type mapping, and any gateway error.
pub fn describe(gateway: &mut Gateway<'_>, table: &str) -> Result<TableSchema> {
    let info = gateway.query(&Statement::new(
        "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid".to_string(),
        Bindings::Row(vec![Value::Text(table.to_string())]),
    ))?;
    if info.rows.is_empty() {
        return Err(SchemaError::TableNotFound(table.to_string()).into());
    }

    let foreign = gateway.query(&Statement::new(
        "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?1)".to_string(),
        Bindings::Row(vec![Value::Text(table.to_string())]),
    ))?;

    let mut columns = Vec::with_capacity(info.rows.len());
    for row in &info.rows {
        let (name, declared, not_null, pk) = (&row[0], &row[1], &row[2], &row[3]);
        let column_type =
            ColumnType::parse_declared(declared).ok_or_else(|| SchemaError::UnsupportedType {
                column: name.clone(),
                declared: declared.clone(),
            })?;

        let references = foreign
            .rows
            .iter()
            .find(|fk| fk[0].eq_ignore_ascii_case(name))
            .map(|fk| ForeignRef {
                table: fk[1].clone(),
                column: (fk[2] != "NULL").then(|| fk[2].clone()),
            });

        columns.push(ColumnSpec {
            name: name.clone(),
            column_type,
            not_null: not_null != "0",
            is_primary_key: pk != "0",
            is_foreign_key: references.is_some(),
            references,
        });
    }

    debug!("Described table {} with {} columns", table, columns.len());
    Ok(TableSchema {
        table: table.to_string(),
        columns,
    })
}

/// Names of all user tables, sorted
pub fn list_tables(gateway: &mut Gateway<'_>) -> Result<Vec<String>> {
    let result = gateway.query(&Statement::new(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            .to_string(),
        Bindings::None,
    ))?;
    Ok(result.rows.into_iter().filter_map(|mut row| row.pop()).collect())
}
