/// Core Module for batchlite
///
/// Shared infrastructure for database sessions, batch writing, query
/// helpers and error handling.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{BatchliteError, Result};
