//! Boundary with the storage driver
//!
//! A driver opens connections, runs query text and streams loosely-typed rows.
//! Resources are released on drop, so every early return (errors,
//! cancellation, `first` stopping after one entity) closes them.

use async_trait::async_trait;

use crate::{shape::ColumnMetadata, value::DbValue};

/// Error raised by a driver; surfaced to callers as-is
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Connection;

    async fn connect(&self) -> Result<Self::Connection, DriverError>;
}

#[async_trait]
pub trait Connection: Send {
    type Cursor: RowCursor;

    /// Run query text and open a cursor over its result
    async fn query(&mut self, sql: &str) -> Result<Self::Cursor, DriverError>;

    /// Run a statement and report the number of affected rows
    async fn execute(&mut self, sql: &str) -> Result<u64, DriverError>;
}

#[async_trait]
pub trait RowCursor: Send {
    /// Metadata for every column of the active result, in ordinal order
    async fn columns(&mut self) -> Result<Vec<ColumnMetadata>, DriverError>;

    /// Next row, `None` once the result is exhausted
    async fn next_row(&mut self) -> Result<Option<Vec<DbValue>>, DriverError>;
}
