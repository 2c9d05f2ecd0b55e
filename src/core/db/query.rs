/// Query Execution Module
///
/// This module provides the single-operation query helpers: commands with
/// named parameters, non-query execution, result sets formatted for
/// display, scalar lookups, paging and cancellation of a running statement.

use crate::core::db::schema::quote_identifier;
use crate::core::{BatchliteError, Result};
use rusqlite::types::{ToSql, Value, ValueRef};
use rusqlite::{Connection, InterruptHandle};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Largest value SQLite accepts for `LIMIT` and `OFFSET`
const MAX_SQL_INTEGER: usize = i64::MAX as usize;

/// SQL text plus the named parameters bound to it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    pub sql: String,
    params: Vec<(String, Value)>,
}

impl Command {
    pub fn new(sql: impl Into<String>) -> Self {
        Command {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Adds a named parameter.
    ///
    /// The name is used as written in the SQL (`:name`, `@name` or
    /// `$name`); a bare name gets the `:` prefix.
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.add_param(name, value);
        self
    }

    /// Adds a named parameter in place
    pub fn add_param(&mut self, name: &str, value: impl Into<Value>) {
        let name = if name.starts_with([':', '@', '$']) {
            name.to_string()
        } else {
            format!(":{}", name)
        };
        self.params.push((name, value.into()));
    }

    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    fn bound(&self) -> Vec<(&str, &dyn ToSql)> {
        self.params
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect()
    }
}

impl From<&str> for Command {
    fn from(sql: &str) -> Self {
        Command::new(sql)
    }
}

/// Represents the result of a SQL query execution
#[derive(Debug)]
pub struct QueryResult {
    /// Column names from the query result
    pub columns: Vec<String>,
    /// Rows of data as string values
    pub rows: Vec<Vec<String>>,
    /// Number of rows returned
    pub row_count: usize,
}

impl QueryResult {
    /// Creates a new QueryResult from column names and row data
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let row_count = rows.len();
        QueryResult {
            columns,
            rows,
            row_count,
        }
    }
}

/// One page of a larger result set
#[derive(Debug)]
pub struct PagedQueryResult {
    /// Column names from the query result
    pub columns: Vec<String>,
    /// Rows of data for this page as string values
    pub rows: Vec<Vec<String>>,
    /// Total number of rows matching the request
    pub total_count: usize,
    /// Maximum number of rows per page
    pub page_size: usize,
    /// Current offset into the result set
    pub current_offset: usize,
    /// Whether there are more pages available
    pub has_more: bool,
}

impl PagedQueryResult {
    /// Creates a new PagedQueryResult
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>, total_count: usize, page_size: usize, current_offset: usize) -> Self {
        let row_count = rows.len();
        PagedQueryResult {
            columns,
            rows,
            total_count,
            page_size,
            current_offset,
            has_more: current_offset + row_count < total_count,
        }
    }

    /// Returns the 1-based index of the next page, if there is one
    pub fn next_page_index(&self) -> Option<usize> {
        if self.has_more && self.page_size > 0 {
            Some(self.current_offset / self.page_size + 2)
        } else {
            None
        }
    }
}

/// Sort order for paged queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// Describes one page of rows to fetch from a table
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub table: String,
    /// Columns to select; empty selects all columns
    pub fields: Vec<String>,
    /// Raw SQL condition without the `WHERE` keyword. Values belong in
    /// `params`, not in this text.
    pub filter: Option<String>,
    pub params: Vec<(String, Value)>,
    pub order_by: String,
    pub direction: SortDirection,
    pub page_size: usize,
    /// 1-based page number
    pub page_index: usize,
}

impl PageRequest {
    pub fn new(table: impl Into<String>, order_by: impl Into<String>) -> Self {
        PageRequest {
            table: table.into(),
            fields: Vec::new(),
            filter: None,
            params: Vec::new(),
            order_by: order_by.into(),
            direction: SortDirection::Ascending,
            page_size: 20,
            page_index: 1,
        }
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, condition: impl Into<String>) -> Self {
        self.filter = Some(condition.into());
        self
    }

    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.push((name.to_string(), value.into()));
        self
    }

    pub fn descending(mut self) -> Self {
        self.direction = SortDirection::Descending;
        self
    }

    pub fn page(mut self, page_index: usize, page_size: usize) -> Self {
        self.page_index = page_index;
        self.page_size = page_size;
        self
    }

    /// Number of rows skipped before this page
    ///
    /// # Errors
    ///
    /// Returns `BatchliteError::InvalidInput` if the offset does not fit in
    /// a SQLite integer.
    pub fn offset(&self) -> Result<usize> {
        self.page_index
            .saturating_sub(1)
            .checked_mul(self.page_size)
            .filter(|&offset| offset <= MAX_SQL_INTEGER)
            .ok_or_else(|| {
                BatchliteError::InvalidInput(format!(
                    "Page {} of size {} is beyond the largest supported offset",
                    self.page_index, self.page_size
                ))
            })
    }

    fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(BatchliteError::InvalidInput("Page request requires a table name".to_string()));
        }
        if self.order_by.trim().is_empty() {
            return Err(BatchliteError::InvalidInput("Page request requires an order column".to_string()));
        }
        if self.page_size == 0 || self.page_index == 0 {
            return Err(BatchliteError::InvalidInput(format!(
                "Page index and size must be positive (got index {}, size {})",
                self.page_index, self.page_size
            )));
        }
        if self.page_size > MAX_SQL_INTEGER {
            return Err(BatchliteError::InvalidInput(format!(
                "Page size {} exceeds the largest SQLite integer",
                self.page_size
            )));
        }
        self.offset().map(|_| ())
    }

    fn with_params(&self, sql: String) -> Command {
        let mut command = Command::new(sql);
        for (name, value) in &self.params {
            command.add_param(name, value.clone());
        }
        command
    }

    /// Builds the page query and the matching count query
    pub fn to_commands(&self) -> Result<(Command, Command)> {
        self.validate()?;
        let offset = self.offset()?;

        let fields = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.iter().map(|f| quote_identifier(f)).collect::<Vec<_>>().join(", ")
        };
        let table = quote_identifier(&self.table);
        let condition = match &self.filter {
            Some(f) if !f.trim().is_empty() => format!(" WHERE {}", f),
            _ => String::new(),
        };

        let select = format!(
            "SELECT {} FROM {}{} ORDER BY {} {} LIMIT {} OFFSET {}",
            fields,
            table,
            condition,
            quote_identifier(&self.order_by),
            self.direction.as_sql(),
            self.page_size,
            offset
        );
        let count = format!("SELECT COUNT(*) FROM {}{}", table, condition);

        Ok((self.with_params(select), self.with_params(count)))
    }
}

/// Interrupt handles of the sessions a database has open, oldest first.
///
/// Each registration gets its own id so a closing session removes only its
/// own handle.
#[derive(Default)]
pub(crate) struct ActiveSessions {
    next_id: u64,
    handles: Vec<(u64, InterruptHandle)>,
}

impl ActiveSessions {
    pub(crate) fn register(&mut self, handle: InterruptHandle) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.handles.push((id, handle));
        id
    }

    pub(crate) fn unregister(&mut self, id: u64) {
        self.handles.retain(|(owner, _)| *owner != id);
    }

    fn latest(&self) -> Option<&InterruptHandle> {
        self.handles.last().map(|(_, handle)| handle)
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }
}

/// Interrupts whatever statement is running on a database's most recently
/// opened session
#[derive(Clone)]
pub struct QueryCanceller {
    sessions: Arc<Mutex<ActiveSessions>>,
}

impl QueryCanceller {
    pub(crate) fn new(sessions: Arc<Mutex<ActiveSessions>>) -> Self {
        QueryCanceller { sessions }
    }

    /// Triggers cancellation of the running statement.
    ///
    /// Returns `false` when no session is open.
    pub fn cancel(&self) -> bool {
        match self.sessions.lock() {
            Ok(guard) => match guard.latest() {
                Some(handle) => {
                    handle.interrupt();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for QueryCanceller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = self.sessions.lock().map(|g| g.len()).unwrap_or(0);
        f.debug_struct("QueryCanceller").field("open_sessions", &open).finish()
    }
}

/// Query execution service that operates on a database connection
pub struct QueryExecutor<'a> {
    connection: &'a Connection,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new QueryExecutor for the given connection
    pub fn new(connection: &'a Connection) -> Self {
        QueryExecutor { connection }
    }

    /// Executes a statement that does not return rows.
    ///
    /// # Returns
    ///
    /// The number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns `BatchliteError::Query` if the statement cannot be prepared
    /// or fails to execute.
    pub fn execute_non_query(&self, command: &Command) -> Result<usize> {
        debug!("Executing: {}", command.sql);
        let mut stmt = self.prepare(&command.sql)?;
        stmt.execute(command.bound().as_slice())
            .map_err(|e| BatchliteError::Query(format!("Statement execution failed: {}", e)))
    }

    /// Executes a SQL query and returns formatted results
    ///
    /// # Errors
    ///
    /// Returns `BatchliteError::Query` if the SQL is invalid or if the
    /// database operation fails.
    pub fn execute(&self, command: &Command) -> Result<QueryResult> {
        debug!("Querying: {}", command.sql);
        let mut stmt = self.prepare(&command.sql)?;

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = stmt.column_count();

        let rows = stmt
            .query_map(command.bound().as_slice(), |row| {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    values.push(format_value(row.get_ref(i)?));
                }
                Ok(values)
            })
            .map_err(|e| BatchliteError::Query(format!("Query execution failed: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| BatchliteError::Query(format!("Result processing failed: {}", e)))?;

        Ok(QueryResult::new(columns, rows))
    }

    /// Returns the first column of the first row as a display string.
    ///
    /// An empty string is returned when the query yields no rows, no
    /// columns, or a NULL value.
    pub fn execute_scalar(&self, command: &Command) -> Result<String> {
        debug!("Scalar query: {}", command.sql);
        let mut stmt = self.prepare(&command.sql)?;
        if stmt.column_count() == 0 {
            stmt.execute(command.bound().as_slice())
                .map_err(|e| BatchliteError::Query(format!("Statement execution failed: {}", e)))?;
            return Ok(String::new());
        }

        let mut rows = stmt
            .query(command.bound().as_slice())
            .map_err(|e| BatchliteError::Query(format!("Query execution failed: {}", e)))?;
        let first = rows
            .next()
            .map_err(|e| BatchliteError::Query(format!("Result processing failed: {}", e)))?;

        let scalar = match first {
            Some(row) => match row
                .get_ref(0)
                .map_err(|e| BatchliteError::Query(format!("Result processing failed: {}", e)))?
            {
                ValueRef::Null => String::new(),
                value => format_value(value),
            },
            None => String::new(),
        };
        Ok(scalar)
    }

    /// Fetches one page of rows along with the total matching row count
    pub fn execute_page(&self, request: &PageRequest) -> Result<PagedQueryResult> {
        let (select, count) = request.to_commands()?;
        let page = self.execute(&select)?;
        let total = self.execute_scalar(&count)?;
        let total_count = parse_count(&total)?;

        Ok(PagedQueryResult::new(
            page.columns,
            page.rows,
            total_count,
            request.page_size,
            request.offset()?,
        ))
    }

    /// Prepares a SQL statement for execution without running it
    ///
    /// # Errors
    ///
    /// Returns `BatchliteError::Query` if the SQL statement cannot be prepared.
    pub fn prepare(&self, sql: &str) -> Result<rusqlite::Statement<'a>> {
        self.connection
            .prepare(sql)
            .map_err(|e| BatchliteError::Query(format!("Failed to prepare statement: {}", e)))
    }
}

/// Parses the result of a `COUNT(*)` query
fn parse_count(text: &str) -> Result<usize> {
    text.parse::<usize>()
        .map_err(|e| BatchliteError::Query(format!("Row count '{}' is not a number: {}", text, e)))
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
