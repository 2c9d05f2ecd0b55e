/// Database Module
///
/// This module provides the database functionality for batchlite,
/// organized into focused submodules.
///
/// ## Architecture
///
/// - **Connection Management** (`connection.rs`): `Database` configuration and per-call sessions
/// - **Row Sets** (`rowset.rs`): In-memory tabular data handed to the writer
/// - **Batch Writing** (`writer.rs`): Transactional, parameter-bound batch inserts
/// - **Schema Introspection** (`schema.rs`): Table metadata used to shape row sets
/// - **Query Execution** (`query.rs`): Commands, queries, scalars, paging and cancellation
///
/// ## Ownership
///
/// No connection is shared between calls. Every `Database` operation opens a
/// session, performs exactly one unit of work and drops the session, which
/// closes the connection on every exit path.
pub mod connection;
pub mod query;
pub mod rowset;
pub mod schema;
pub mod writer;

pub use connection::*;
pub use query::*;
pub use rowset::*;
pub use schema::*;
pub use writer::*;
