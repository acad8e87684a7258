/// Connection Management Module
///
/// This module obtains and releases the single live connection owned by a
/// [`crate::database::Database`] handle. There is no process-wide connection
/// state: a provider hands out a fresh `rusqlite::Connection` on every
/// `connect` and the caller owns it until it gives it back.

use crate::core::{Result, TabqlError};
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Name reserved for an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// What identifies the database to open.
///
/// SQLite has no user accounts, so the database name is the whole
/// credential. Names are lower-cased, matching how databases are addressed
/// elsewhere in tabql.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub database: String,
}

impl Credentials {
    /// Validates and normalizes a database name.
    ///
    /// # Errors
    ///
    /// Returns `TabqlError::Connection` when the name is empty or would
    /// escape the data directory.
    pub fn new(database: &str) -> Result<Self> {
        let database = database.trim();
        if database == IN_MEMORY {
            return Ok(Credentials {
                database: IN_MEMORY.to_string(),
            });
        }
        if database.is_empty()
            || database.contains(&['/', '\\', '\0'][..])
            || database.starts_with('.')
        {
            return Err(TabqlError::Connection(format!(
                "invalid database name '{}'",
                database
            )));
        }
        Ok(Credentials {
            database: database.to_lowercase(),
        })
    }

    /// Whether these credentials select an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.database == IN_MEMORY
    }
}

/// Supplies and releases connections.
///
/// Implementations never retry: a failed `connect` is fatal to the handle
/// that asked for it.
pub trait ConnectionProvider {
    /// Opens the database. With `create` set, a missing database is created;
    /// otherwise a missing database is a connection error.
    fn connect(&self, credentials: &Credentials, create: bool) -> Result<Connection>;

    /// Closes a connection previously returned by `connect`.
    fn disconnect(&self, connection: Connection) -> Result<()>;

    /// Removes the database entirely. The caller must have disconnected.
    fn destroy(&self, credentials: &Credentials) -> Result<()>;
}

/// File-backed SQLite provider: database `name` lives at `<data_dir>/<name>.db`.
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    data_dir: PathBuf,
    busy_timeout: Option<Duration>,
}

impl SqliteProvider {
    /// Creates a provider rooted at `data_dir`.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        SqliteProvider {
            data_dir: data_dir.as_ref().to_path_buf(),
            busy_timeout: None,
        }
    }

    /// Sets the driver-level busy timeout applied to every new connection.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    /// Path of the file backing `credentials`, or `None` for in-memory databases.
    pub fn database_path(&self, credentials: &Credentials) -> Option<PathBuf> {
        if credentials.is_in_memory() {
            None
        } else {
            Some(self.data_dir.join(format!("{}.db", credentials.database)))
        }
    }
}

impl ConnectionProvider for SqliteProvider {
    fn connect(&self, credentials: &Credentials, create: bool) -> Result<Connection> {
        let conn = match self.database_path(credentials) {
            None => Connection::open_in_memory(),
            Some(path) => {
                let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX;
                if create {
                    fs::create_dir_all(&self.data_dir).map_err(|e| {
                        TabqlError::Connection(format!(
                            "cannot create data directory {}: {}",
                            self.data_dir.display(),
                            e
                        ))
                    })?;
                    flags |= OpenFlags::SQLITE_OPEN_CREATE;
                }
                debug!("Opening database file {:?} (create: {})", path, create);
                Connection::open_with_flags(&path, flags)
            }
        }
        .map_err(|e| {
            TabqlError::Connection(format!(
                "cannot open database '{}': {}",
                credentials.database, e
            ))
        })?;

        if let Some(timeout) = self.busy_timeout {
            conn.busy_timeout(timeout)
                .map_err(|e| TabqlError::Connection(e.to_string()))?;
        }

        debug!("Opened connection to {}", credentials.database);
        Ok(conn)
    }

    fn disconnect(&self, connection: Connection) -> Result<()> {
        connection
            .close()
            .map_err(|(_, e)| TabqlError::Connection(format!("cannot close connection: {}", e)))
    }

    fn destroy(&self, credentials: &Credentials) -> Result<()> {
        let Some(path) = self.database_path(credentials) else {
            return Ok(());
        };
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed database file {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TabqlError::Connection(format!(
                "cannot remove database '{}': {}",
                credentials.database, e
            ))),
        }
    }
}
