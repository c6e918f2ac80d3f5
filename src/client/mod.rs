//! Client facade
//!
//! Each call is self-contained: bind parameters, open a connection, run the
//! query, read column metadata, build a fresh shape tree and stream rows
//! through a fresh hydrator. Nothing is shared between calls.
//!
//! Every driver wait (connect, query, each row) is raced against the call's
//! [`CancelSignal`]. Any error or cancellation discards whatever was hydrated
//! so far; connection and cursor are dropped on every exit path.

pub mod cancel;
pub mod driver;
pub mod errors;
pub mod memory;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use validator::Validate;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use driver::{Connection, Connector, DriverError, RowCursor};
pub use errors::{ClientError, ErrorKind};

use crate::{
    config::{ClientConfig, ConfigError},
    hydrate::{self, HydrateError, Hydrator},
    shape::{Entity, EntityShape, ShapeTree},
    tokenizer::{parameterize, Params},
    value::ScalarType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    All,
    /// Stop reading once a second root identity shows up
    First,
}

pub struct Client<C: Connector> {
    connector: C,
    config: ClientConfig,
}

impl<C: Connector> Client<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            config: ClientConfig::default(),
        }
    }

    pub fn with_config(connector: C, config: ClientConfig) -> Result<Self, ClientError> {
        config.validate().map_err(ConfigError::from)?;
        Ok(Self { connector, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// All root entities produced by the query, in first-seen order
    pub async fn to_list<T: Entity>(
        &self,
        sql: &str,
        params: &Params,
    ) -> Result<Vec<T>, ClientError> {
        self.to_list_with(sql, params, &CancelSignal::never()).await
    }

    pub async fn to_list_with<T: Entity>(
        &self,
        sql: &str,
        params: &Params,
        cancel: &CancelSignal,
    ) -> Result<Vec<T>, ClientError> {
        let values = self
            .fetch(&T::shape(), sql, params, cancel, FetchMode::All)
            .await?;
        Ok(hydrate::decode(values)?)
    }

    /// The first root entity, or `None` when the query returned no rows
    pub async fn first_or_default<T: Entity>(
        &self,
        sql: &str,
        params: &Params,
    ) -> Result<Option<T>, ClientError> {
        self.first_or_default_with(sql, params, &CancelSignal::never())
            .await
    }

    pub async fn first_or_default_with<T: Entity>(
        &self,
        sql: &str,
        params: &Params,
        cancel: &CancelSignal,
    ) -> Result<Option<T>, ClientError> {
        let values = self
            .fetch(&T::shape(), sql, params, cancel, FetchMode::First)
            .await?;
        Ok(hydrate::decode(values)?.into_iter().next())
    }

    /// Like [`Client::first_or_default`], but an empty result is `NotFound`
    pub async fn first<T: Entity>(&self, sql: &str, params: &Params) -> Result<T, ClientError> {
        self.first_with(sql, params, &CancelSignal::never()).await
    }

    pub async fn first_with<T: Entity>(
        &self,
        sql: &str,
        params: &Params,
        cancel: &CancelSignal,
    ) -> Result<T, ClientError> {
        self.first_or_default_with(sql, params, cancel)
            .await?
            .ok_or(ClientError::NotFound)
    }

    /// First column of the first row. `None` for no rows or a NULL value.
    pub async fn execute_scalar<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &Params,
    ) -> Result<Option<T>, ClientError> {
        self.execute_scalar_with(sql, params, &CancelSignal::never())
            .await
    }

    pub async fn execute_scalar_with<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &Params,
        cancel: &CancelSignal,
    ) -> Result<Option<T>, ClientError> {
        let sql = self.prepare(sql, params)?;
        let mut cancel = cancel.clone();

        let mut conn = race(&mut cancel, self.connector.connect()).await?;
        let mut cursor = race(&mut cancel, conn.query(&sql)).await?;
        let columns = race(&mut cancel, cursor.columns()).await?;
        if columns.is_empty() {
            return Err(ClientError::NotScalar);
        }

        let Some(row) = race(&mut cancel, cursor.next_row()).await? else {
            return Ok(None);
        };
        match row.into_iter().next() {
            Some(value) if !value.is_null() => {
                let decoded = serde_json::from_value(value.to_json(ScalarType::Any))
                    .map_err(HydrateError::from)?;
                Ok(Some(decoded))
            }
            _ => Ok(None),
        }
    }

    /// Run a statement without mapping; returns the affected row count
    pub async fn execute(&self, sql: &str, params: &Params) -> Result<u64, ClientError> {
        self.execute_with(sql, params, &CancelSignal::never()).await
    }

    pub async fn execute_with(
        &self,
        sql: &str,
        params: &Params,
        cancel: &CancelSignal,
    ) -> Result<u64, ClientError> {
        let sql = self.prepare(sql, params)?;
        let mut cancel = cancel.clone();

        let mut conn = race(&mut cancel, self.connector.connect()).await?;
        race(&mut cancel, conn.execute(&sql)).await
    }

    /// Hydrate against a shape known only at runtime
    pub async fn to_values(
        &self,
        shape: &EntityShape,
        sql: &str,
        params: &Params,
    ) -> Result<Vec<Value>, ClientError> {
        self.to_values_with(shape, sql, params, &CancelSignal::never())
            .await
    }

    pub async fn to_values_with(
        &self,
        shape: &EntityShape,
        sql: &str,
        params: &Params,
        cancel: &CancelSignal,
    ) -> Result<Vec<Value>, ClientError> {
        self.fetch(shape, sql, params, cancel, FetchMode::All).await
    }

    pub async fn first_value_with(
        &self,
        shape: &EntityShape,
        sql: &str,
        params: &Params,
        cancel: &CancelSignal,
    ) -> Result<Option<Value>, ClientError> {
        let values = self
            .fetch(shape, sql, params, cancel, FetchMode::First)
            .await?;
        Ok(values.into_iter().next())
    }

    /// Substitute parameters; a binding error means nothing reaches the driver
    fn prepare(&self, sql: &str, params: &Params) -> Result<String, ClientError> {
        let sql = parameterize(sql, params)?;
        if self.config.log_queries {
            log::debug!("Executing query: {}", sql);
        }
        Ok(sql)
    }

    async fn fetch(
        &self,
        shape: &EntityShape,
        sql: &str,
        params: &Params,
        cancel: &CancelSignal,
        mode: FetchMode,
    ) -> Result<Vec<Value>, ClientError> {
        let sql = self.prepare(sql, params)?;
        let mut cancel = cancel.clone();

        let mut conn = race(&mut cancel, self.connector.connect()).await?;
        let mut cursor = race(&mut cancel, conn.query(&sql)).await?;
        let columns = race(&mut cancel, cursor.columns()).await?;

        // shape problems surface before any row is read
        let tree = ShapeTree::build(shape, &columns, self.config.build_options())?;
        let mut hydrator = Hydrator::new(&tree);
        let mut rows = 0usize;

        while let Some(row) = race(&mut cancel, cursor.next_row()).await? {
            // rows of later roots are never populated in first mode
            if mode == FetchMode::First
                && hydrator.root_count() > 0
                && hydrator.would_start_new_root(&row)
            {
                log::debug!("Stopping after {} rows, first entity complete", rows);
                break;
            }
            rows += 1;
            hydrator.push_row(row)?;
        }

        let values = hydrator.finish();
        log::debug!(
            "Hydrated {} {} entities from {} rows",
            values.len(),
            shape.name,
            rows
        );
        Ok(values)
    }
}

/// Await a driver operation unless cancellation fires first
async fn race<T, F>(cancel: &mut CancelSignal, operation: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, DriverError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = operation => result.map_err(ClientError::Driver),
    }
}
