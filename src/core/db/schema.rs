/// Schema Introspection Module
///
/// Reads table metadata from SQLite so row sets can be shaped after an
/// existing table, and provides identifier quoting for generated SQL.

use crate::core::Result;
use rusqlite::{Connection, OptionalExtension, Row};

/// Represents a database column with its metadata
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared type name (e.g., "INTEGER", "TEXT"); empty when undeclared
    pub type_name: String,
    /// Whether the column allows NULL values
    pub notnull: bool,
    /// Whether this column is part of the primary key
    pub pk: bool,
    /// Default value expression (if any)
    pub dflt_value: Option<String>,
}

impl Column {
    /// Creates a Column from a table_info result row
    fn from_pragma_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Column {
            name: row.get(1)?,
            type_name: row.get(2)?,
            notnull: row.get(3)?,
            pk: row.get::<_, i64>(5)? > 0,
            dflt_value: row.get(4)?,
        })
    }
}

/// Quotes an identifier for use in generated SQL.
///
/// Embedded double quotes are doubled, so any table or column name is
/// passed through literally rather than interpreted as SQL.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Retrieves column information for a table, in declaration order.
///
/// Returns an empty list when the table does not exist.
pub fn table_columns(conn: &Connection, table_name: &str) -> Result<Vec<Column>> {
    let mut stmt = conn.prepare(
        "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)",
    )?;
    let column_iter = stmt.query_map([table_name], |row| Column::from_pragma_row(row))?;

    let mut columns = Vec::new();
    for column_result in column_iter {
        columns.push(column_result?);
    }

    Ok(columns)
}

/// Checks whether a user table or view with the given name exists
pub fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
            [table_name],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}
