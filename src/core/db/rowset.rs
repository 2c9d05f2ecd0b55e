/// Row Set Module
///
/// In-memory tabular data: an ordered list of named columns plus rows of
/// values aligned with those columns. This is the value handed to the
/// batch writer.

use crate::core::db::schema;
use crate::core::{BatchliteError, Result};
use rusqlite::types::Value;
use rusqlite::Connection;

/// Describes one column of a row set
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name, matching the destination table's column
    pub name: String,
    /// Declared SQL type, when known
    pub sql_type: Option<String>,
    /// Whether the storage engine assigns this column's value
    pub auto_generated: bool,
}

impl ColumnDef {
    /// Creates a regular (caller-supplied) column
    pub fn new(name: impl Into<String>) -> Self {
        ColumnDef {
            name: name.into(),
            sql_type: None,
            auto_generated: false,
        }
    }

    /// Creates a column whose value is assigned by the database
    pub fn auto(name: impl Into<String>) -> Self {
        ColumnDef {
            auto_generated: true,
            ..ColumnDef::new(name)
        }
    }

    /// Sets the declared SQL type
    pub fn with_type(mut self, sql_type: impl Into<String>) -> Self {
        self.sql_type = Some(sql_type.into());
        self
    }
}

/// A single row, positionally aligned with the owning row set's columns
pub type Row = Vec<Value>;

/// Ordered columns plus ordered rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<ColumnDef>,
    rows: Vec<Row>,
}

impl RowSet {
    /// Creates an empty row set with the given columns.
    ///
    /// # Errors
    ///
    /// Returns `BatchliteError::InvalidInput` if a column name is empty or
    /// appears more than once.
    pub fn new(columns: Vec<ColumnDef>) -> Result<Self> {
        for (i, column) in columns.iter().enumerate() {
            if column.name.trim().is_empty() {
                return Err(BatchliteError::InvalidInput(format!(
                    "Column {} has an empty name",
                    i
                )));
            }
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(BatchliteError::InvalidInput(format!(
                    "Duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(RowSet {
            columns,
            rows: Vec::new(),
        })
    }

    /// Creates an empty row set shaped like an existing table.
    ///
    /// A column is marked auto-generated when it is the table's only
    /// primary key column and is declared `INTEGER`, which makes it an
    /// alias for SQLite's rowid.
    pub fn for_table(conn: &Connection, table: &str) -> Result<Self> {
        let columns = schema::table_columns(conn, table)?;
        if columns.is_empty() {
            return Err(BatchliteError::InvalidInput(format!(
                "Table '{}' does not exist or has no columns",
                table
            )));
        }

        let pk_count = columns.iter().filter(|c| c.pk).count();
        let defs = columns
            .into_iter()
            .map(|c| {
                let rowid_alias = c.pk && pk_count == 1 && c.type_name.eq_ignore_ascii_case("INTEGER");
                ColumnDef {
                    name: c.name,
                    sql_type: if c.type_name.is_empty() { None } else { Some(c.type_name) },
                    auto_generated: rowid_alias,
                }
            })
            .collect();

        RowSet::new(defs)
    }

    /// Appends a row. Values are positional, in column order.
    ///
    /// # Errors
    ///
    /// Returns `BatchliteError::InvalidInput` if the row's length differs
    /// from the number of columns.
    pub fn push_row(&mut self, row: Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(BatchliteError::InvalidInput(format!(
                "Row has {} values but the row set has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Builder-style variant of [`RowSet::push_row`]
    pub fn with_row(mut self, row: Row) -> Result<Self> {
        self.push_row(row)?;
        Ok(self)
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the named column, if present
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Looks up a row's value by column name
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Columns that receive explicit values on insert, in column order
    pub fn insertable_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| !c.auto_generated)
    }
}
