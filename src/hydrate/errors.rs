use thiserror::Error;

use crate::value::ScalarType;

/// Failures while turning rows into entities. Any of these aborts the whole call;
/// nothing hydrated so far is handed out.
#[derive(Debug, Error)]
pub enum HydrateError {
    #[error("'{entity}.{field}' is not nullable but column '{column}' returned NULL")]
    NullabilityViolation {
        entity: String,
        field: String,
        column: String,
    },

    #[error("Column '{column}' holds a {found} value, which cannot be assigned to '{entity}.{field}' ({expected})")]
    TypeMismatch {
        entity: String,
        field: String,
        column: String,
        expected: ScalarType,
        found: &'static str,
    },

    #[error("Row has {found} values but the result declared {expected} columns")]
    RowWidth { expected: usize, found: usize },

    #[error("Failed to decode hydrated entity: {0}")]
    Decode(#[from] serde_json::Error),
}
