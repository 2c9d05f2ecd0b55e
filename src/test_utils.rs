/// # Test Utilities Module
///
/// Shared fixtures for batchlite's in-crate tests.
///
/// This module provides:
/// - File-backed database fixtures (each `Database` call opens its own
///   session, so in-memory databases would not persist between calls)
/// - Row set builders for the standard schema
/// - BatchliteError-specific assertion helpers

use crate::core::db::{ColumnDef, Command, Database, RowSet};
use crate::core::Result;
use rusqlite::types::Value;
use rusqlite::Connection;
use tempfile::TempDir;

/// Isolated database test fixture backed by a temporary file
pub struct DatabaseFixture {
    pub name: String,
    pub database: Database,
    // Keeps the directory alive for the fixture's lifetime
    _dir: TempDir,
}

impl DatabaseFixture {
    /// Create a new, empty test database
    pub fn new(name: &str) -> Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join(format!("{}.db", name));
        let database = Database::at(path.to_string_lossy().to_string());

        Ok(DatabaseFixture {
            name: name.to_string(),
            database,
            _dir: dir,
        })
    }

    /// Create fixture with the standard schema
    pub fn with_schema(name: &str) -> Result<Self> {
        let fixture = Self::new(name)?;
        fixture.setup_standard_schema()?;
        Ok(fixture)
    }

    /// Set up standard test schema
    pub fn setup_standard_schema(&self) -> Result<()> {
        let session = self.database.open_session()?;
        session.execute_batch(
            "
            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                active BOOLEAN DEFAULT 1
            );

            CREATE TABLE posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users (id)
            );
        ",
        )?;
        Ok(())
    }

    /// Opens a direct connection for assertions
    pub fn connection(&self) -> Result<Connection> {
        Ok(Connection::open(&self.database.config().path)?)
    }

    /// Number of rows currently in `table`
    pub fn count(&self, table: &str) -> Result<i64> {
        let count = self
            .database
            .execute_scalar(&Command::new(format!("SELECT COUNT(*) FROM {}", table)))?;
        Ok(count.parse().unwrap_or(0))
    }
}

/// Builds a `users` row set with an auto-generated id column
pub fn users_rowset(users: &[(&str, &str)]) -> RowSet {
    let mut rows = RowSet::new(vec![
        ColumnDef::auto("id").with_type("INTEGER"),
        ColumnDef::new("username").with_type("TEXT"),
        ColumnDef::new("email").with_type("TEXT"),
    ])
    .expect("static column list is valid");

    for (username, email) in users {
        rows.push_row(vec![
            Value::Null,
            Value::Text(username.to_string()),
            Value::Text(email.to_string()),
        ])
        .expect("row matches column count");
    }
    rows
}

/// Error testing utilities specific to BatchliteError patterns
pub mod error_testing {
    /// Verify error message quality (contains helpful information)
    pub fn verify_error_message_quality<T, E>(result: &std::result::Result<T, E>, context: &str)
    where
        T: std::fmt::Debug,
        E: std::fmt::Display,
    {
        match result {
            Ok(value) => panic!("Expected an error but got Ok({:?}) in {}", value, context),
            Err(error) => {
                let error_str = error.to_string();
                assert!(!error_str.is_empty(), "Error message should not be empty in {}", context);
                assert!(error_str.len() > 10, "Error message should be descriptive in {}", context);

                let lower = error_str.to_lowercase();
                let has_operation_context =
                    lower.contains("failure") || lower.contains("failed") || lower.contains("error") || lower.contains("invalid");
                assert!(
                    has_operation_context,
                    "Error should indicate what operation failed: '{}' in {}",
                    error_str, context
                );
            }
        }
    }
}

#[macro_export]
macro_rules! assert_batchlite_error {
    ($result:expr, $expected:pat, $context:expr) => {
        match $result {
            Err($expected) => {}
            Ok(_) => panic!("Expected {} but got Ok in {}", stringify!($expected), $context),
            Err(other) => panic!("Expected {} but got {:?} in {}", stringify!($expected), other, $context),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BatchliteError;

    #[test]
    fn test_database_fixture_creation() {
        let fixture = DatabaseFixture::new("test_create").unwrap();
        assert_eq!(fixture.name, "test_create");
        assert!(fixture.database.test_connection());
    }

    #[test]
    fn test_schema_fixture() {
        let fixture = DatabaseFixture::with_schema("test_schema").unwrap();
        assert_eq!(fixture.count("users").unwrap(), 0);
        assert_eq!(fixture.count("posts").unwrap(), 0);
    }

    #[test]
    fn test_users_rowset_shape() {
        let rows = users_rowset(&[("alice", "alice@example.com")]);
        assert_eq!(rows.len(), 1);
        assert!(rows.columns()[0].auto_generated);
    }

    #[test]
    fn test_error_assertion_macro() {
        let result: Result<i32> = Err(BatchliteError::Unsupported("Test error".to_string()));
        assert_batchlite_error!(result, BatchliteError::Unsupported(_), "macro test");
    }
}
