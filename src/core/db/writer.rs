/// Batch Writer Module
///
/// Inserts every row of a [`RowSet`] into a table inside a transaction,
/// binding each value as a parameter. Auto-generated columns are left out
/// of the statement through a column-selection list; the caller's row set
/// is never modified.

use crate::core::db::rowset::{Row, RowSet};
use crate::core::db::schema::quote_identifier;
use crate::core::{BatchliteError, Result};
use rusqlite::{params_from_iter, Connection};
use std::num::NonZeroUsize;
use tracing::{debug, info, warn};

/// Controls how a batch is split into transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// `None` inserts the whole row set in one transaction. `Some(n)`
    /// commits every `n` rows separately, so a failure only rolls back the
    /// chunk it happened in.
    pub chunk_size: Option<NonZeroUsize>,
}

impl BatchOptions {
    /// All rows in a single all-or-nothing transaction
    pub fn atomic() -> Self {
        BatchOptions { chunk_size: None }
    }

    /// One transaction per `size` rows
    pub fn chunked(size: NonZeroUsize) -> Self {
        BatchOptions {
            chunk_size: Some(size),
        }
    }
}

/// Outcome of a successful batch insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertReport {
    /// Number of rows written
    pub rows_inserted: usize,
    /// Number of transactions committed
    pub chunks_committed: usize,
}

/// A parameterized INSERT template and the row positions bound to it
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    /// SQL text with positional parameters `?1..?n`
    pub sql: String,
    /// For each parameter, the index of the row value bound to it
    pub bindings: Vec<usize>,
}

impl InsertStatement {
    /// Builds the INSERT template for `rows` against `table`.
    ///
    /// Only insertable columns appear, in column order. When every column
    /// is auto-generated the statement inserts `DEFAULT VALUES`.
    pub fn for_rows(table: &str, rows: &RowSet) -> Self {
        let bindings: Vec<usize> = rows
            .insertable_columns()
            .filter_map(|c| rows.column_index(&c.name))
            .collect();

        if bindings.is_empty() {
            return InsertStatement {
                sql: format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table)),
                bindings,
            };
        }

        let column_list = rows
            .insertable_columns()
            .map(|c| quote_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=bindings.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");

        InsertStatement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_identifier(table),
                column_list,
                placeholders
            ),
            bindings,
        }
    }
}

/// Writes row sets into tables using parameter-bound, transactional inserts
#[derive(Debug, Clone, Default)]
pub struct BatchWriter {
    options: BatchOptions,
}

/// Rejects a blank destination table name.
pub(crate) fn validate_table_name(table: &str) -> Result<()> {
    if table.trim().is_empty() {
        return Err(BatchliteError::InvalidInput(
            "Batch insert requires a non-empty table name".to_string(),
        ));
    }
    Ok(())
}

impl BatchWriter {
    pub fn new(options: BatchOptions) -> Self {
        BatchWriter { options }
    }

    pub fn options(&self) -> BatchOptions {
        self.options
    }

    /// Inserts all rows of `rows` into `table`.
    ///
    /// With the default options every row is written in one transaction:
    /// either all rows are committed or, on any failure, none are. An empty
    /// row set returns immediately without touching the connection.
    ///
    /// # Errors
    ///
    /// - `BatchliteError::InvalidInput` if `table` is blank
    /// - `BatchliteError::WriteFailure` if preparing or executing any row
    ///   fails; the open transaction has been rolled back and `committed`
    ///   counts rows from earlier chunks that remain in the table
    pub fn insert(&self, conn: &mut Connection, table: &str, rows: &RowSet) -> Result<InsertReport> {
        validate_table_name(table)?;
        if rows.is_empty() {
            debug!("Batch insert into '{}' skipped: no rows", table);
            return Ok(InsertReport::default());
        }

        let statement = InsertStatement::for_rows(table, rows);
        let chunk_size = self
            .options
            .chunk_size
            .map(NonZeroUsize::get)
            .unwrap_or(rows.len());
        debug!("Batch insert statement: {}", statement.sql);

        let mut report = InsertReport::default();
        for chunk in rows.rows().chunks(chunk_size) {
            insert_chunk(conn, &statement, chunk).map_err(|source| {
                warn!(
                    "Batch insert into '{}' failed after {} committed rows: {}",
                    table, report.rows_inserted, source
                );
                BatchliteError::WriteFailure {
                    table: table.to_string(),
                    committed: report.rows_inserted,
                    source,
                }
            })?;
            report.rows_inserted += chunk.len();
            report.chunks_committed += 1;
            debug!("Committed chunk of {} rows into '{}'", chunk.len(), table);
        }

        info!(
            "Inserted {} rows into '{}' in {} transaction(s)",
            report.rows_inserted, table, report.chunks_committed
        );
        Ok(report)
    }
}

/// Runs one transaction over `rows`, rolling it back on the first failure
fn insert_chunk(conn: &mut Connection, statement: &InsertStatement, rows: &[Row]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    match execute_rows(&tx, statement, rows) {
        Ok(()) => tx.commit(),
        Err(e) => {
            if let Err(rollback_err) = tx.rollback() {
                warn!("Rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

fn execute_rows(conn: &Connection, statement: &InsertStatement, rows: &[Row]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(&statement.sql)?;
    for row in rows {
        stmt.execute(params_from_iter(statement.bindings.iter().map(|&i| &row[i])))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::rowset::ColumnDef;
    use rusqlite::types::Value;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn setup(conn: &Connection) {
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT UNIQUE);",
        )
        .unwrap();
    }

    fn names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn.prepare("SELECT name FROM t ORDER BY name").unwrap();
        let names = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<String>>>()
            .unwrap();
        names
    }

    fn auto_id_rows(values: &[&str]) -> RowSet {
        let mut rows = RowSet::new(vec![ColumnDef::auto("id"), ColumnDef::new("name")]).unwrap();
        for v in values {
            rows.push_row(vec![Value::Null, text(v)]).unwrap();
        }
        rows
    }

    #[test]
    fn test_statement_skips_auto_generated_columns() {
        let rows = auto_id_rows(&["a"]);
        let statement = InsertStatement::for_rows("t", &rows);
        assert_eq!(statement.sql, "INSERT INTO \"t\" (\"name\") VALUES (?1)");
        assert_eq!(statement.bindings, vec![1]);
    }

    #[test]
    fn test_statement_all_auto_generated() {
        let rows = RowSet::new(vec![ColumnDef::auto("id")]).unwrap();
        let statement = InsertStatement::for_rows("t", &rows);
        assert_eq!(statement.sql, "INSERT INTO \"t\" DEFAULT VALUES");
        assert!(statement.bindings.is_empty());
    }

    #[test]
    fn test_auto_generated_ids_assigned_by_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup(&conn);

        let rows = auto_id_rows(&["a", "b"]);
        let report = BatchWriter::default().insert(&mut conn, "t", &rows).unwrap();
        assert_eq!(report, InsertReport { rows_inserted: 2, chunks_committed: 1 });
        assert_eq!(names(&conn), vec!["a", "b"]);

        let ids: i64 = conn
            .query_row("SELECT COUNT(DISTINCT id) FROM t WHERE id IS NOT NULL", [], |r| r.get(0))
            .unwrap();
        assert_eq!(ids, 2);
    }

    #[test]
    fn test_auto_generated_values_are_never_sent() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup(&conn);

        // Explicit ids in an auto-generated column must be ignored
        let rows = RowSet::new(vec![ColumnDef::auto("id"), ColumnDef::new("name")])
            .unwrap()
            .with_row(vec![Value::Integer(500), text("x")])
            .unwrap();
        BatchWriter::default().insert(&mut conn, "t", &rows).unwrap();

        let id: i64 = conn.query_row("SELECT id FROM t", [], |r| r.get(0)).unwrap();
        assert_ne!(id, 500);
    }

    #[test]
    fn test_unique_violation_rolls_back_everything() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup(&conn);

        let rows = auto_id_rows(&["a", "b", "a"]);
        let result = BatchWriter::default().insert(&mut conn, "t", &rows);

        match result {
            Err(BatchliteError::WriteFailure { table, committed, source }) => {
                assert_eq!(table, "t");
                assert_eq!(committed, 0);
                assert!(source.to_string().contains("UNIQUE"));
            }
            other => panic!("Expected WriteFailure, got {:?}", other),
        }
        assert!(names(&conn).is_empty());
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_empty_rowset_is_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        // No table exists: any database work would fail
        let rows = auto_id_rows(&[]);
        let report = BatchWriter::default().insert(&mut conn, "missing", &rows).unwrap();
        assert_eq!(report, InsertReport::default());
    }

    #[test]
    fn test_blank_table_name_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        let rows = auto_id_rows(&["a"]);
        let result = BatchWriter::default().insert(&mut conn, "  ", &rows);
        assert!(matches!(result, Err(BatchliteError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_table_is_write_failure() {
        let mut conn = Connection::open_in_memory().unwrap();
        let rows = auto_id_rows(&["a"]);
        let result = BatchWriter::default().insert(&mut conn, "missing", &rows);
        assert!(matches!(result, Err(BatchliteError::WriteFailure { committed: 0, .. })));
    }

    #[test]
    fn test_input_rowset_is_not_modified() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup(&conn);

        let rows = auto_id_rows(&["a", "b"]);
        let before = rows.clone();
        BatchWriter::default().insert(&mut conn, "t", &rows).unwrap();
        assert_eq!(rows, before);
        assert_eq!(rows.columns().len(), 2);
    }

    #[test]
    fn test_chunked_failure_keeps_earlier_chunks() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup(&conn);

        let writer = BatchWriter::new(BatchOptions::chunked(NonZeroUsize::new(2).unwrap()));
        let rows = auto_id_rows(&["a", "b", "c", "a", "d"]);
        let result = writer.insert(&mut conn, "t", &rows);

        assert!(matches!(result, Err(BatchliteError::WriteFailure { committed: 2, .. })));
        assert_eq!(names(&conn), vec!["a", "b"]);
    }

    #[test]
    fn test_chunked_success_counts_transactions() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup(&conn);

        let writer = BatchWriter::new(BatchOptions::chunked(NonZeroUsize::new(2).unwrap()));
        let rows = auto_id_rows(&["a", "b", "c", "d", "e"]);
        let report = writer.insert(&mut conn, "t", &rows).unwrap();

        assert_eq!(report, InsertReport { rows_inserted: 5, chunks_committed: 3 });
        assert_eq!(names(&conn).len(), 5);
    }

    #[test]
    fn test_values_of_every_storage_class() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE v (i INTEGER, r REAL, s TEXT, b BLOB, n TEXT)")
            .unwrap();

        let rows = RowSet::new(
            ["i", "r", "s", "b", "n"].iter().map(|c| ColumnDef::new(*c)).collect(),
        )
        .unwrap()
        .with_row(vec![
            Value::Integer(7),
            Value::Real(1.5),
            text("it's"),
            Value::Blob(vec![1, 2, 3]),
            Value::Null,
        ])
        .unwrap();
        BatchWriter::default().insert(&mut conn, "v", &rows).unwrap();

        let (i, r, s, b, n): (i64, f64, String, Vec<u8>, Option<String>) = conn
            .query_row("SELECT i, r, s, b, n FROM v", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })
            .unwrap();
        assert_eq!((i, r, s.as_str(), b, n), (7, 1.5, "it's", vec![1, 2, 3], None));
    }
}
