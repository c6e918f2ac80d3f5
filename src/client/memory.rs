//! In-process driver serving scripted result sets
//!
//! Used by the test suite and by the CLI fixture runner. Results are registered
//! per exact (already parameterized) query text, with an optional fallback for
//! any other text. Connection open/close counts are tracked so callers can
//! check that every exit path released its connection.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::driver::{Connection, Connector, DriverError, RowCursor};
use crate::{shape::ColumnMetadata, value::DbValue};

/// One scripted result
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<DbValue>>,
    pub rows_affected: u64,
    /// Fail with a driver error instead of returning the row at this index
    pub fail_at_row: Option<usize>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnMetadata>, rows: Vec<Vec<DbValue>>) -> Self {
        Self {
            columns,
            rows,
            ..Default::default()
        }
    }

    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Default::default()
        }
    }

    pub fn failing_at(mut self, row: usize) -> Self {
        self.fail_at_row = Some(row);
        self
    }
}

#[derive(Debug, Default)]
pub struct MemoryStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

impl MemoryStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Connections currently open
    pub fn open(&self) -> usize {
        self.opened() - self.closed.load(Ordering::SeqCst)
    }

    /// Every query text sent to the driver, in order
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, sql: &str) {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql.to_string());
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    results: Arc<HashMap<String, ResultSet>>,
    fallback: Option<Arc<ResultSet>>,
    connect_error: Option<String>,
    row_delay: Option<Duration>,
    stats: Arc<MemoryStats>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `result` for exactly this query text
    pub fn with_result(mut self, sql: impl Into<String>, result: ResultSet) -> Self {
        Arc::make_mut(&mut self.results).insert(sql.into(), result);
        self
    }

    /// Serve `result` for any query text without its own registration
    pub fn with_fallback(mut self, result: ResultSet) -> Self {
        self.fallback = Some(Arc::new(result));
        self
    }

    /// Make every connection attempt fail
    pub fn failing_connect(mut self, message: impl Into<String>) -> Self {
        self.connect_error = Some(message.into());
        self
    }

    /// Sleep before handing out each row
    pub fn with_row_delay(mut self, delay: Duration) -> Self {
        self.row_delay = Some(delay);
        self
    }

    pub fn stats(&self) -> Arc<MemoryStats> {
        Arc::clone(&self.stats)
    }

    fn lookup(&self, sql: &str) -> Result<ResultSet, DriverError> {
        self.results
            .get(sql)
            .cloned()
            .or_else(|| self.fallback.as_deref().cloned())
            .ok_or_else(|| format!("no result registered for query: {}", sql).into())
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection, DriverError> {
        if let Some(message) = &self.connect_error {
            return Err(message.clone().into());
        }
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        log::debug!("Opened in-memory connection #{}", self.stats.opened());
        Ok(MemoryConnection {
            connector: self.clone(),
        })
    }
}

pub struct MemoryConnection {
    connector: MemoryConnector,
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.connector.stats.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    type Cursor = MemoryCursor;

    async fn query(&mut self, sql: &str) -> Result<MemoryCursor, DriverError> {
        self.connector.stats.record(sql);
        let result = self.connector.lookup(sql)?;
        Ok(MemoryCursor {
            columns: result.columns,
            rows: result.rows.into(),
            position: 0,
            fail_at_row: result.fail_at_row,
            delay: self.connector.row_delay,
        })
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, DriverError> {
        self.connector.stats.record(sql);
        Ok(self.connector.lookup(sql)?.rows_affected)
    }
}

pub struct MemoryCursor {
    columns: Vec<ColumnMetadata>,
    rows: VecDeque<Vec<DbValue>>,
    position: usize,
    fail_at_row: Option<usize>,
    delay: Option<Duration>,
}

#[async_trait]
impl RowCursor for MemoryCursor {
    async fn columns(&mut self) -> Result<Vec<ColumnMetadata>, DriverError> {
        Ok(self.columns.clone())
    }

    async fn next_row(&mut self) -> Result<Option<Vec<DbValue>>, DriverError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_at_row == Some(self.position) {
            return Err(format!("connection lost while reading row {}", self.position).into());
        }
        self.position += 1;
        Ok(self.rows.pop_front())
    }
}
