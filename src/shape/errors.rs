//! # Shape Error Types
//!
//! Raised while building the descriptor tree, before any row is read. Every
//! offending field across the whole tree is collected into one error.

use std::fmt;
use thiserror::Error;

/// A single structural problem found while resolving a shape against result columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeIssue {
    /// Non-nullable field with no matching result column
    UnresolvedField {
        entity: String,
        field: String,
        column: String,
        table: String,
    },
    /// A group that needs an identity tuple has no key column
    MissingIdentity {
        entity: String,
        field: Option<String>,
    },
}

impl ShapeIssue {
    /// Field the issue is about, if it concerns a single field
    pub fn field(&self) -> Option<&str> {
        match self {
            ShapeIssue::UnresolvedField { field, .. } => Some(field),
            ShapeIssue::MissingIdentity { field, .. } => field.as_deref(),
        }
    }
}

impl fmt::Display for ShapeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeIssue::UnresolvedField {
                entity,
                field,
                column,
                table,
            } => write!(
                f,
                "Type '{}' has non-nullable field '{}' not found among query results (expected column '{}' of table '{}')",
                entity, field, column, table
            ),
            ShapeIssue::MissingIdentity {
                entity,
                field: Some(field),
            } => write!(
                f,
                "Collection '{}' of '{}' elements has no key column to identify elements by",
                field, entity
            ),
            ShapeIssue::MissingIdentity {
                entity,
                field: None,
            } => write!(
                f,
                "Type '{}' has collections but no key column to identify rows by",
                entity
            ),
        }
    }
}

fn render_issues(issues: &[ShapeIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {}", issue))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("Shape of '{entity}' does not match the query result:\n{}", render_issues(.issues))]
    Invalid {
        entity: String,
        issues: Vec<ShapeIssue>,
    },
}

impl ShapeError {
    pub fn issues(&self) -> &[ShapeIssue] {
        match self {
            ShapeError::Invalid { issues, .. } => issues,
        }
    }

    /// Whether any issue names `field`
    pub fn mentions_field(&self, field: &str) -> bool {
        self.issues().iter().any(|issue| issue.field() == Some(field))
    }
}
