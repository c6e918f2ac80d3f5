use thiserror::Error;

/// Failures while binding named parameters into query text.
///
/// All of these are raised before the query reaches the store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BindError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Unsupported value for parameter '{name}': {reason}")]
    UnsupportedValue { name: String, reason: String },

    #[error("Parameters must serialize to a map of named values: {0}")]
    NotAMap(String),
}
