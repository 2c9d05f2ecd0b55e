/// Batchlite Error Module
///
/// This module defines the error types for the batchlite crate.
/// Batch inserts report a single failure kind (`WriteFailure`) that carries
/// the underlying SQLite error; the remaining variants cover the query
/// helpers, configuration and input validation.
use thiserror::Error;

/// Error type for the batchlite crate.
///
/// This enum covers the failure scenarios that can occur:
/// - Opening and configuring database sessions
/// - Batch inserts (always reported as `WriteFailure`)
/// - Query helper execution
/// - Configuration loading and row import
#[derive(Error, Debug)]
pub enum BatchliteError {
    /// Session-level errors from SQLite (open, pragmas)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A batch insert failed and its open transaction was rolled back
    #[error("Write failure on table '{table}' ({committed} rows committed before failure): {source}")]
    WriteFailure {
        table: String,
        committed: usize,
        #[source]
        source: rusqlite::Error,
    },

    /// SQL query errors (syntax, execution, missing tables, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Caller errors detected before any database work is done
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operations SQLite has no equivalent for
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl BatchliteError {
    /// Returns the underlying SQLite error, if this error wraps one.
    pub fn sqlite_error(&self) -> Option<&rusqlite::Error> {
        match self {
            BatchliteError::Database(e) => Some(e),
            BatchliteError::WriteFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Type alias for Result to use BatchliteError as the error type.
pub type Result<T> = std::result::Result<T, BatchliteError>;
