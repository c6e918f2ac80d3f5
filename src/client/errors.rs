//! # Client Error Types
//!
//! Every failure of a client call maps onto one `ClientError`; `kind()` gives
//! callers a flat category to branch on.

use thiserror::Error;

use super::driver::DriverError;
use crate::{
    config::ConfigError, hydrate::HydrateError, shape::ShapeError, tokenizer::BindError,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Parameter binding failed: {0}")]
    Bind(#[from] BindError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("Hydration failed: {0}")]
    Hydrate(#[from] HydrateError),

    /// Connection or execution failure, passed through from the driver untouched
    #[error("Driver error: {0}")]
    Driver(#[source] DriverError),

    #[error("Query did not result in a fully populated object")]
    NotFound,

    #[error("Query returned no columns to read a scalar from")]
    NotScalar,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid client configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Binding,
    Shape,
    Hydration,
    TypeMismatch,
    Driver,
    NotFound,
    Cancelled,
    Config,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Bind(_) => ErrorKind::Binding,
            ClientError::Shape(_) => ErrorKind::Shape,
            ClientError::Hydrate(HydrateError::TypeMismatch { .. } | HydrateError::Decode(_)) => {
                ErrorKind::TypeMismatch
            }
            ClientError::Hydrate(_) => ErrorKind::Hydration,
            ClientError::Driver(_) => ErrorKind::Driver,
            ClientError::NotFound | ClientError::NotScalar => ErrorKind::NotFound,
            ClientError::Cancelled => ErrorKind::Cancelled,
            ClientError::Config(_) => ErrorKind::Config,
        }
    }
}
