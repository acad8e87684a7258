//! The database handle.
//!
//! [`Database`] owns the single live connection and routes every operation
//! through the same pipeline: rows are shaped by the inferencer and the
//! statement builder, destructive statements pass the guard, and everything
//! runs through the execution gateway. Each public operation emits exactly
//! one `info!` on success or one `error!` on failure.

use crate::builder::{self, RowRecord, SelectQuery};
use crate::core::db::{
    self, ColumnSpec, Credentials, ConnectionProvider, Execution, Gateway, ResultSet,
    SqliteProvider, Statement, TableSchema, IN_MEMORY,
};
use crate::core::{Result, SchemaError, TabqlError};
use crate::guard::{Confirm, Guard, GuardState};
use crate::infer::TypeInferencer;
use crate::source;
use rusqlite::Connection;
use std::path::Path;
use tracing::{error, info};

/// Result of a guarded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Executed,
    /// The confirmation was declined and nothing ran
    Declined,
}

/// Top-level handle over one database.
pub struct Database<C, P = SqliteProvider> {
    credentials: Credentials,
    provider: P,
    connection: Option<Connection>,
    guard: Guard<C>,
    inferencer: TypeInferencer,
    preview: bool,
    statements_sent: usize,
}

fn report<T>(operation: &str, target: &str, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => info!("{}: '{}'", operation, target),
        Err(e) => error!("{} '{}' failed: {}", operation, target, e),
    }
    result
}

impl<C: Confirm> Database<C, SqliteProvider> {
    /// A connected in-memory database.
    pub fn in_memory(confirmer: C) -> Result<Self> {
        let mut database = Database::new(
            SqliteProvider::new("."),
            Credentials::new(IN_MEMORY)?,
            confirmer,
        );
        database.connect(true)?;
        Ok(database)
    }
}

impl<C: Confirm, P: ConnectionProvider> Database<C, P> {
    /// A disconnected handle. Call [`Database::connect`] or [`Database::login`].
    pub fn new(provider: P, credentials: Credentials, confirmer: C) -> Self {
        Database {
            credentials,
            provider,
            connection: None,
            guard: Guard::new(confirmer),
            inferencer: TypeInferencer::default(),
            preview: false,
            statements_sent: 0,
        }
    }

    /// Replaces the inference policy.
    pub fn with_inferencer(mut self, inferencer: TypeInferencer) -> Self {
        self.inferencer = inferencer;
        self
    }

    /// Prints each statement before it runs.
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn database_name(&self) -> &str {
        &self.credentials.database
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn guard(&self) -> &Guard<C> {
        &self.guard
    }

    pub fn inferencer(&self) -> &TypeInferencer {
        &self.inferencer
    }

    /// Statements sent to the driver over the lifetime of this handle,
    /// metadata queries included.
    pub fn statements_sent(&self) -> usize {
        self.statements_sent
    }

    /// Opens the connection, creating the database first when `create` is set.
    /// An existing connection is closed and replaced.
    pub fn connect(&mut self, create: bool) -> Result<()> {
        let result = self.replace_connection(create);
        report("Connected to database", &self.credentials.database, result)
    }

    /// Opens the connection to an existing database.
    pub fn login(&mut self) -> Result<()> {
        self.connect(false)
    }

    /// Closes the connection. Later calls fail with `NotConnected` until the
    /// next login.
    pub fn logout(&mut self) -> Result<()> {
        let result = match self.connection.take() {
            Some(conn) => self.provider.disconnect(conn),
            None => Ok(()),
        };
        report("Logged out of database", &self.credentials.database, result)
    }

    fn replace_connection(&mut self, create: bool) -> Result<()> {
        if let Some(conn) = self.connection.take() {
            self.provider.disconnect(conn)?;
        }
        self.connection = Some(self.provider.connect(&self.credentials, create)?);
        Ok(())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TabqlError::NotConnected)
        }
    }

    /// Runs `f` against a gateway over the live connection and counts what
    /// it sent.
    fn with_gateway<T>(&mut self, f: impl FnOnce(&mut Gateway<'_>) -> Result<T>) -> Result<T> {
        let mut gateway = Gateway::new(self.connection.as_mut());
        let result = f(&mut gateway);
        self.statements_sent += gateway.executed();
        result
    }

    fn run(&mut self, statement: &Statement, expect_result_set: bool) -> Result<Execution> {
        if self.preview {
            println!("{}", statement.text());
        }
        self.with_gateway(|gateway| gateway.execute(statement, expect_result_set))
    }

    /// Live definition of `table`, read fresh on every call.
    pub fn describe(&mut self, table: &str) -> Result<TableSchema> {
        let result = self.with_gateway(|gateway| db::describe(gateway, table));
        report("Described table", table, result)
    }

    /// All user tables.
    pub fn tables(&mut self) -> Result<Vec<String>> {
        let result = self.with_gateway(db::list_tables);
        report("Listed tables of", &self.credentials.database, result)
    }

    /// Creates `table` from explicit column definitions.
    pub fn create_table(&mut self, table: &str, columns: &[ColumnSpec]) -> Result<()> {
        let result = builder::build_create(table, columns)
            .and_then(|stmt| self.run(&stmt, false))
            .map(|_| ());
        report("Created table", table, result)
    }

    /// Creates `table` from a header line. The first header column is the
    /// primary key; the rest are inferred.
    pub fn create(&mut self, header: &str, table: &str) -> Result<TableSchema> {
        let result = self.create_from_header(header, table);
        report("Created table", table, result)
    }

    fn create_from_header(&mut self, header: &str, table: &str) -> Result<TableSchema> {
        let names = source::split_line(header);
        if names.iter().all(|n| n.trim().is_empty()) {
            return Err(SchemaError::EmptySchema(table.to_string()).into());
        }
        let columns = self.inferencer.infer_header(&names)?;
        let stmt = builder::build_create(table, &columns)?;
        self.run(&stmt, false)?;
        Ok(TableSchema {
            table: table.to_string(),
            columns,
        })
    }

    /// Inserts delimited lines into `table`.
    ///
    /// With `header` set the first line names the columns and values are
    /// aligned to the live schema by name; otherwise every line is a row in
    /// live-schema order. Returns the number of rows inserted.
    pub fn insert(&mut self, lines: &[String], table: &str, header: bool) -> Result<usize> {
        let result = self.insert_rows(table, &records(lines, header));
        report("Inserted rows into table", table, result)
    }

    /// Inserts prepared rows into `table`.
    pub fn insert_records(&mut self, table: &str, rows: &[RowRecord]) -> Result<usize> {
        let result = self.insert_rows(table, rows);
        report("Inserted rows into table", table, result)
    }

    fn insert_rows(&mut self, table: &str, rows: &[RowRecord]) -> Result<usize> {
        let schema = self.with_gateway(|gateway| db::describe(gateway, table))?;
        let stmt = builder::build_insert(table, &schema, rows)?;
        match self.run(&stmt, false)? {
            Execution::Done { affected } => Ok(affected),
            Execution::Rows(_) => Ok(0),
        }
    }

    /// Creates `table` from the first line and inserts the rest.
    pub fn new_table(&mut self, lines: &[String], table: &str) -> Result<usize> {
        let result = match lines.first() {
            Some(head) => self
                .create_from_header(head, table)
                .and_then(|_| self.insert_rows(table, &records(lines, true))),
            None => Err(SchemaError::EmptySchema(table.to_string()).into()),
        };
        report("Loaded table", table, result)
    }

    /// Loads a delimited file into a new table, named after the file stem
    /// unless `table` is given. Returns the table name.
    pub fn load_file<Q: AsRef<Path>>(&mut self, path: Q, table: Option<&str>) -> Result<String> {
        let path = path.as_ref();
        let name = match table.map(str::to_string).or_else(|| source::table_name(path)) {
            Some(name) => name,
            None => {
                return Err(SchemaError::InvalidIdentifier {
                    name: path.display().to_string(),
                    reason: "has no usable file name",
                }
                .into())
            }
        };
        let lines = source::read_lines(path)?;
        self.new_table(&lines, &name)?;
        Ok(name)
    }

    /// Loads several files in order, stopping at the first failure.
    pub fn load_files<Q: AsRef<Path>>(&mut self, paths: &[Q]) -> Result<Vec<String>> {
        paths.iter().map(|path| self.load_file(path, None)).collect()
    }

    /// Runs a read query. An order on an all-columns selection is resolved
    /// against the live column list.
    pub fn read(&mut self, query: &SelectQuery) -> Result<ResultSet> {
        let result = self.read_rows(query);
        report("Read table", &query.table, result)
    }

    fn read_rows(&mut self, query: &SelectQuery) -> Result<ResultSet> {
        let expanded;
        let query = if query.order.is_some() && query.columns.is_empty() && query.joins.is_empty() {
            let schema = self.with_gateway(|gateway| db::describe(gateway, &query.table))?;
            expanded = query.clone().columns(schema.column_names().as_slice());
            &expanded
        } else {
            query
        };
        let stmt = builder::build_select(query)?;
        match self.run(&stmt, true)? {
            Execution::Rows(rows) => Ok(rows),
            Execution::Done { .. } => Ok(ResultSet {
                columns: Vec::new(),
                rows: Vec::new(),
            }),
        }
    }

    fn guarded(&mut self, prompt: &str, force: bool, statement: &Statement) -> Result<Outcome> {
        self.ensure_connected()?;
        match self.guard.check(prompt, force) {
            GuardState::Confirmed => {
                self.run(statement, false)?;
                Ok(Outcome::Executed)
            }
            _ => Ok(Outcome::Declined),
        }
    }

    /// Drops `table` after confirmation.
    pub fn drop_table(&mut self, table: &str, force: bool) -> Result<Outcome> {
        let prompt = format!("Are you sure you want to drop the table '{}' completely?", table);
        let result = builder::build_drop(table).and_then(|stmt| self.guarded(&prompt, force, &stmt));
        report_guarded("Dropped table", table, result)
    }

    /// Deletes every row of `table` after confirmation, keeping the table.
    pub fn empty(&mut self, table: &str, force: bool) -> Result<Outcome> {
        let prompt = format!("Are you sure you want to remove all data from the table '{}'?", table);
        let result =
            builder::build_truncate(table).and_then(|stmt| self.guarded(&prompt, force, &stmt));
        report_guarded("Emptied table", table, result)
    }

    /// Drops the whole database after confirmation. The handle is left
    /// disconnected; [`Database::connect`] with `create` recreates it.
    pub fn drop_database(&mut self, force: bool) -> Result<Outcome> {
        let prompt = format!(
            "Are you sure you want to drop the database '{}'?",
            self.credentials.database
        );
        let result = self.drop_database_inner(&prompt, force);
        report_guarded("Dropped database", &self.credentials.database, result)
    }

    fn drop_database_inner(&mut self, prompt: &str, force: bool) -> Result<Outcome> {
        self.ensure_connected()?;
        if self.guard.check(prompt, force) != GuardState::Confirmed {
            return Ok(Outcome::Declined);
        }
        let tables = self.with_gateway(db::list_tables)?;
        let stmt = builder::build_drop_database(&tables)?;
        self.run(&stmt, false)?;
        if let Some(conn) = self.connection.take() {
            self.provider.disconnect(conn)?;
        }
        self.provider.destroy(&self.credentials)?;
        Ok(Outcome::Executed)
    }

    /// Drops the database and recreates it empty under the same name.
    ///
    /// The steps commit one at a time; a failure part way leaves the
    /// completed steps in place.
    pub fn reset(&mut self, force: bool) -> Result<Outcome> {
        let prompt = format!(
            "Are you sure you want to reset the database '{}'?",
            self.credentials.database
        );
        let result = self.drop_database_inner(&prompt, force).and_then(|outcome| {
            if outcome == Outcome::Executed {
                self.replace_connection(true)?;
            }
            Ok(outcome)
        });
        report_guarded("Reset database", &self.credentials.database, result)
    }
}

/// Splits delimited lines into row records. With `header` the first line
/// names the columns of the rest.
fn records(lines: &[String], header: bool) -> Vec<RowRecord> {
    if !header {
        return lines
            .iter()
            .map(|line| RowRecord::positional(&source::split_line(line)))
            .collect();
    }
    match lines.split_first() {
        Some((head, body)) => {
            let names = source::split_line(head);
            body.iter()
                .map(|line| RowRecord::keyed(&names, &source::split_line(line)))
                .collect()
        }
        None => Vec::new(),
    }
}

fn report_guarded(operation: &str, target: &str, result: Result<Outcome>) -> Result<Outcome> {
    match result {
        Ok(Outcome::Declined) => Ok(Outcome::Declined),
        other => report(operation, target, other),
    }
}
