/// Connection Management Module
///
/// `Database` holds connection settings only. Every operation opens its own
/// [`Session`], does one unit of work and drops the session, which closes
/// the connection whether the operation succeeded or failed.

use crate::core::db::query::{
    ActiveSessions, Command, PageRequest, PagedQueryResult, QueryCanceller, QueryExecutor, QueryResult,
};
use crate::core::db::rowset::RowSet;
use crate::core::db::writer::{validate_table_name, BatchOptions, BatchWriter, InsertReport};
use crate::core::{BatchliteError, Result};
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Settings applied to every session a `Database` opens
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Path to the SQLite database file, or ":memory:"
    pub path: String,
    /// How long to wait on a locked database before failing
    pub busy_timeout: Option<Duration>,
    /// Whether to enforce foreign key constraints
    pub foreign_keys: bool,
    /// Journal mode to request (e.g. "WAL", "DELETE")
    pub journal_mode: Option<String>,
}

impl ConnectionConfig {
    pub fn new(path: impl Into<String>) -> Self {
        ConnectionConfig {
            path: path.into(),
            busy_timeout: None,
            foreign_keys: true,
            journal_mode: None,
        }
    }
}

/// An open connection owned by exactly one operation.
///
/// While a session is alive its interrupt handle is registered with the
/// owning `Database`, so a [`QueryCanceller`] can stop the running
/// statement. Dropping the session unregisters it and closes the connection.
pub struct Session {
    conn: Connection,
    id: Option<u64>,
    sessions: Arc<Mutex<ActiveSessions>>,
}

impl Session {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl Deref for Session {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let (Some(id), Ok(mut guard)) = (self.id, self.sessions.lock()) {
            guard.unregister(id);
        }
        debug!("Session closed");
    }
}

/// Entry point for data access against one SQLite database
pub struct Database {
    config: ConnectionConfig,
    writer: BatchWriter,
    active: Arc<Mutex<ActiveSessions>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("writer", &self.writer)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates a database handle. No connection is opened until an
    /// operation runs.
    pub fn new(config: ConnectionConfig) -> Self {
        Database {
            config,
            writer: BatchWriter::default(),
            active: Arc::new(Mutex::new(ActiveSessions::default())),
        }
    }

    /// Shorthand for a database at `path` with default settings
    pub fn at(path: impl Into<String>) -> Self {
        Database::new(ConnectionConfig::new(path))
    }

    /// Replaces the batch options used by [`Database::batch_insert`]
    pub fn with_batch_options(mut self, options: BatchOptions) -> Self {
        self.writer = BatchWriter::new(options);
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Opens a new session with the configured pragmas applied
    ///
    /// # Errors
    ///
    /// Returns `BatchliteError::Database` if the file cannot be opened or a
    /// pragma cannot be applied.
    pub fn open_session(&self) -> Result<Session> {
        let conn = Connection::open(&self.config.path)?;

        if let Some(timeout) = self.config.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        conn.pragma_update(None, "foreign_keys", self.config.foreign_keys)?;
        if let Some(mode) = &self.config.journal_mode {
            let applied: String =
                conn.pragma_update_and_check(None, "journal_mode", mode, |row| row.get(0))?;
            if !applied.eq_ignore_ascii_case(mode) {
                debug!("Requested journal_mode {} but SQLite kept {}", mode, applied);
            }
        }

        let id = match self.active.lock() {
            Ok(mut guard) => Some(guard.register(conn.get_interrupt_handle())),
            Err(_) => {
                warn!("Session registry poisoned; session on {} cannot be cancelled", self.config.path);
                None
            }
        };
        debug!("Session opened on {}", self.config.path);

        Ok(Session {
            conn,
            id,
            sessions: Arc::clone(&self.active),
        })
    }

    /// Returns a handle that interrupts the statement running on the most
    /// recently opened session that is still open, if any
    pub fn canceller(&self) -> QueryCanceller {
        QueryCanceller::new(Arc::clone(&self.active))
    }

    /// Checks that the database can be opened and answers a trivial query
    pub fn test_connection(&self) -> bool {
        let outcome = self
            .open_session()
            .and_then(|session| Ok(session.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?));
        match outcome {
            Ok(_) => true,
            Err(e) => {
                warn!("Connection test against {} failed: {}", self.config.path, e);
                false
            }
        }
    }

    /// Inserts every row of `rows` into `table` on a fresh session.
    ///
    /// A blank table name fails with `InvalidInput` and an empty row set
    /// returns immediately, both without opening a connection. See
    /// [`BatchWriter::insert`] for transaction and error semantics.
    pub fn batch_insert(&self, table: &str, rows: &RowSet) -> Result<InsertReport> {
        validate_table_name(table)?;
        if rows.is_empty() {
            debug!("Batch insert into '{}' skipped: no rows", table);
            return Ok(InsertReport::default());
        }
        info!("Batch inserting {} rows into '{}'", rows.len(), table);
        let mut session = self.open_session()?;
        self.writer.insert(session.connection_mut(), table, rows)
    }

    /// Executes a statement that returns no rows.
    ///
    /// Returns `true` when at least one row was changed.
    pub fn execute_non_query(&self, command: &Command) -> Result<bool> {
        let session = self.open_session()?;
        let changed = QueryExecutor::new(&session).execute_non_query(command)?;
        Ok(changed > 0)
    }

    /// Runs a query and returns all rows formatted for display
    pub fn execute_query(&self, command: &Command) -> Result<QueryResult> {
        let session = self.open_session()?;
        QueryExecutor::new(&session).execute(command)
    }

    /// Returns the first column of the first row, or an empty string
    pub fn execute_scalar(&self, command: &Command) -> Result<String> {
        let session = self.open_session()?;
        QueryExecutor::new(&session).execute_scalar(command)
    }

    /// Fetches one page of a table
    pub fn fetch_page(&self, request: &PageRequest) -> Result<PagedQueryResult> {
        let session = self.open_session()?;
        QueryExecutor::new(&session).execute_page(request)
    }

    /// Stored procedures do not exist in SQLite; this always fails.
    pub fn execute_stored(&self, procedure: &str) -> Result<QueryResult> {
        Err(BatchliteError::Unsupported(format!(
            "SQLite does not support stored procedures (requested '{}')",
            procedure
        )))
    }
}
