/// Query Execution Module
///
/// This module is the single entry point through which every statement
/// reaches the database. It binds parameters, commits, materializes result
/// sets, and converts driver faults into `TabqlError::Execution`.

use crate::core::{Result, TabqlError};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use tracing::debug;

/// Values bound to a statement's placeholders.
#[derive(Debug, Clone, PartialEq)]
pub enum Bindings {
    /// No placeholders
    None,
    /// One row of values, positional
    Row(Vec<Value>),
    /// One row of values per execution; all rows commit together or not at all
    Batch(Vec<Vec<Value>>),
}

/// Statement text plus its bound values. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    text: String,
    bindings: Bindings,
    skip: usize,
}

impl Statement {
    pub(crate) fn new(text: String, bindings: Bindings) -> Self {
        Statement {
            text,
            bindings,
            skip: 0,
        }
    }

    /// Leading result rows the gateway discards. SQLite only accepts OFFSET
    /// after a LIMIT, so an offset without a limit travels here instead.
    pub(crate) fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// The SQL text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The bound values.
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Result rows skipped before materializing.
    pub fn skip(&self) -> usize {
        self.skip
    }
}

/// Fully materialized rows returned by a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    /// Column names from the query result
    pub columns: Vec<String>,
    /// Rows of data as display strings
    pub rows: Vec<Vec<String>>,
}

impl ResultSet {
    /// Number of rows returned
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Renders the rows as a JSON array of objects keyed by column name.
    pub fn to_json(&self) -> Result<String> {
        let objects: Vec<serde_json::Map<String, serde_json::Value>> = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned().map(serde_json::Value::String))
                    .collect()
            })
            .collect();
        Ok(serde_json::to_string_pretty(&objects)?)
    }

    /// Renders the rows as tab-separated lines with a header line.
    pub fn to_table(&self) -> String {
        let mut out = self.columns.join("\t");
        for row in &self.rows {
            out.push('\n');
            out.push_str(&row.join("\t"));
        }
        out
    }
}

/// Outcome of a successful execution
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// Statement ran and was committed; `affected` counts changed rows where
    /// the driver reports them
    Done { affected: usize },
    /// Statement returned rows
    Rows(ResultSet),
}

/// Execution gateway over the handle's connection.
///
/// A gateway built without a connection fails every call with
/// `TabqlError::NotConnected`; it never opens one on its own.
pub struct Gateway<'a> {
    connection: Option<&'a mut Connection>,
    executed: usize,
}

impl<'a> Gateway<'a> {
    /// Creates a gateway for the given connection, if any
    pub fn new(connection: Option<&'a mut Connection>) -> Self {
        Gateway {
            connection,
            executed: 0,
        }
    }

    /// Statements this gateway has sent to the driver
    pub fn executed(&self) -> usize {
        self.executed
    }

    /// Executes a statement and commits.
    ///
    /// # Arguments
    ///
    /// * `statement` - The statement to execute
    /// * `expect_result_set` - Whether to return the rows produced
    ///
    /// # Returns
    ///
    /// `Execution::Rows` when rows were requested, otherwise `Execution::Done`.
    ///
    /// # Errors
    ///
    /// Returns `TabqlError::NotConnected` without a connection and
    /// `TabqlError::Execution` for any fault reported by SQLite.
    pub fn execute(&mut self, statement: &Statement, expect_result_set: bool) -> Result<Execution> {
        let conn = self
            .connection
            .as_deref_mut()
            .ok_or(TabqlError::NotConnected)?;

        self.executed += 1;
        debug!("Executing: {}", statement.text());
        let outcome = if expect_result_set {
            query_rows(conn, statement).map(Execution::Rows)
        } else {
            run(conn, statement).map(|affected| Execution::Done { affected })
        };

        outcome.map_err(|e| {
            debug!("Statement failed: {}", e);
            TabqlError::execution(e)
        })
    }

    /// Executes a statement that must return rows.
    pub fn query(&mut self, statement: &Statement) -> Result<ResultSet> {
        match self.execute(statement, true)? {
            Execution::Rows(rows) => Ok(rows),
            Execution::Done { .. } => Ok(ResultSet {
                columns: Vec::new(),
                rows: Vec::new(),
            }),
        }
    }
}

fn run(conn: &mut Connection, statement: &Statement) -> rusqlite::Result<usize> {
    match statement.bindings() {
        Bindings::None => {
            conn.execute_batch(statement.text())?;
            Ok(0)
        }
        Bindings::Row(values) => conn.execute(statement.text(), params_from_iter(values.iter())),
        Bindings::Batch(rows) => {
            let tx = conn.transaction()?;
            let mut affected = 0;
            {
                let mut stmt = tx.prepare(statement.text())?;
                for values in rows {
                    affected += stmt.execute(params_from_iter(values.iter()))?;
                }
            }
            tx.commit()?;
            debug!("Committed batch of {} rows", rows.len());
            Ok(affected)
        }
    }
}

fn query_rows(conn: &mut Connection, statement: &Statement) -> rusqlite::Result<ResultSet> {
    let values: &[Value] = match statement.bindings() {
        Bindings::None => &[],
        Bindings::Row(values) => values,
        Bindings::Batch(_) => return Err(rusqlite::Error::ExecuteReturnedResults),
    };

    let mut stmt = conn.prepare(statement.text())?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let column_count = stmt.column_count();

    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            (0..column_count)
                .map(|i| row.get_ref(i).map(format_value))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .skip(statement.skip())
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(ResultSet { columns, rows })
}

/// Formats a SQLite value for display
fn format_value(value: ValueRef) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(b) => format!("<BLOB: {} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(conn: &Connection) {
        conn.execute_batch(
            "
            CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT NOT NULL, value REAL);
            INSERT INTO test VALUES (1, 'Alice', 123.45);
            INSERT INTO test VALUES (2, 'Bob', NULL);
        ",
        )
        .unwrap();
    }

    fn stmt(text: &str, bindings: Bindings) -> Statement {
        Statement::new(text.to_string(), bindings)
    }

    #[test]
    fn test_query_materializes_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup(&conn);

        let mut gateway = Gateway::new(Some(&mut conn));
        let result = gateway
            .query(&stmt("SELECT * FROM test ORDER BY id", Bindings::None))
            .unwrap();

        assert_eq!(result.columns, vec!["id", "name", "value"]);
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.rows[0], vec!["1", "Alice", "123.45"]);
        assert_eq!(result.rows[1], vec!["2", "Bob", "NULL"]);
    }

    #[test]
    fn test_skip_and_executed_count() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup(&conn);

        let mut gateway = Gateway::new(Some(&mut conn));
        let result = gateway
            .query(&stmt("SELECT name FROM test ORDER BY id", Bindings::None).with_skip(1))
            .unwrap();
        assert_eq!(result.rows, vec![vec!["Bob"]]);
        assert_eq!(gateway.executed(), 1);

        // Failed statements still reached the driver
        assert!(gateway.query(&stmt("SELECT * FROM missing", Bindings::None)).is_err());
        assert_eq!(gateway.executed(), 2);
    }

    #[test]
    fn test_query_with_bound_row() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup(&conn);

        let mut gateway = Gateway::new(Some(&mut conn));
        let result = gateway
            .query(&stmt(
                "SELECT name FROM test WHERE id = ?1",
                Bindings::Row(vec![Value::Integer(2)]),
            ))
            .unwrap();
        assert_eq!(result.rows, vec![vec!["Bob".to_string()]]);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup(&conn);

        {
            let mut gateway = Gateway::new(Some(&mut conn));
            // Second row violates the primary key; the first must not survive
            let batch = stmt(
                "INSERT INTO test (id, name, value) VALUES (?1, ?2, ?3)",
                Bindings::Batch(vec![
                    vec![Value::Integer(3), Value::Text("Carol".into()), Value::Real(1.0)],
                    vec![Value::Integer(1), Value::Text("Dup".into()), Value::Real(2.0)],
                ]),
            );
            let err = gateway.execute(&batch, false).unwrap_err();
            assert!(matches!(err, TabqlError::Execution { .. }));
        }

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM test", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_batch_commits() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup(&conn);

        let mut gateway = Gateway::new(Some(&mut conn));
        let batch = stmt(
            "INSERT INTO test (id, name, value) VALUES (?1, ?2, ?3)",
            Bindings::Batch(vec![
                vec![Value::Integer(3), Value::Text("Carol".into()), Value::Real(1.0)],
                vec![Value::Integer(4), Value::Text("Dave".into()), Value::Real(2.0)],
            ]),
        );
        assert_eq!(
            gateway.execute(&batch, false).unwrap(),
            Execution::Done { affected: 2 }
        );
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_driver_error_is_normalized() {
        let mut conn = Connection::open_in_memory().unwrap();
        let mut gateway = Gateway::new(Some(&mut conn));

        match gateway.query(&stmt("SELECT * FROM nonexistent_table", Bindings::None)) {
            Err(TabqlError::Execution { message }) => assert!(message.contains("no such table")),
            other => panic!("Expected Execution error, got {:?}", other),
        }
    }

    #[test]
    fn test_without_connection() {
        let mut gateway = Gateway::new(None);
        let err = gateway
            .execute(&stmt("SELECT 1", Bindings::None), true)
            .unwrap_err();
        assert!(matches!(err, TabqlError::NotConnected));
    }

    #[test]
    fn test_result_rendering() {
        let rows = ResultSet {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec!["1".into(), "Alice".into()]],
        };
        assert_eq!(rows.to_table(), "id\tname\n1\tAlice");

        let json: serde_json::Value = serde_json::from_str(&rows.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["name"], "Alice");
    }
}
