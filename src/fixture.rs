//! YAML fixtures: a query, its bound parameters, a runtime shape and the
//! rows a driver would return for it.
//!
//! ```yaml
//! query: "select * from root r left join child c on c.RootId = r.Id where r.Id = :id"
//! params:
//!   id: 1
//! shape:
//!   name: Root
//!   table: root
//!   fields:
//!     - { name: Id, type: uint, key: true }
//!     - { name: Name, type: text }
//!     - name: Children
//!       collection:
//!         name: Child
//!         table: child
//!         fields:
//!           - { name: Id, type: uint, key: true }
//! columns:
//!   - { name: Id, table: root }
//!   - { name: Name, table: root }
//!   - { name: Id, table: child }
//! rows:
//!   - [1, "a", 10]
//!   - [1, "a", null]
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::{
    client::memory::{MemoryConnector, ResultSet},
    shape::{ColumnMetadata, EntityShape, FieldShape},
    tokenizer::Params,
    value::{DbValue, ScalarType},
};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to read fixture {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid fixture YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Field '{field}' of '{entity}': {reason}")]
    Field {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("Row {row}, column {column}: {reason}")]
    Cell {
        row: usize,
        column: usize,
        reason: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    pub query: String,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    pub shape: ShapeSpec,
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShapeSpec {
    pub name: String,
    pub table: Option<String>,
    pub schema: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

/// One field; exactly one of `type`, `nested` or `collection` is set
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Option<ScalarType>,
    pub nested: Option<ShapeSpec>,
    pub collection: Option<ShapeSpec>,
    pub column: Option<String>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub excluded: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub table: Option<String>,
    pub schema: Option<String>,
    #[serde(default)]
    pub key: bool,
    /// Parse text cells of this column as `date`/`datetime`
    #[serde(rename = "type")]
    pub ty: Option<ScalarType>,
}

impl Fixture {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, FixtureError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn params(&self) -> Params {
        Params::from(self.params.clone())
    }

    pub fn entity_shape(&self) -> Result<EntityShape, FixtureError> {
        self.shape.to_shape()
    }

    pub fn columns(&self) -> Vec<ColumnMetadata> {
        self.columns
            .iter()
            .enumerate()
            .map(|(ordinal, spec)| ColumnMetadata {
                name: spec.name.clone(),
                table: spec.table.clone(),
                schema: spec.schema.clone(),
                ordinal,
                is_key: spec.key,
            })
            .collect()
    }

    pub fn rows(&self) -> Result<Vec<Vec<DbValue>>, FixtureError> {
        self.rows
            .iter()
            .enumerate()
            .map(|(row, cells)| {
                cells
                    .iter()
                    .enumerate()
                    .map(|(column, cell)| {
                        let ty = self.columns.get(column).and_then(|c| c.ty);
                        parse_cell(cell, ty).map_err(|reason| FixtureError::Cell {
                            row,
                            column,
                            reason,
                        })
                    })
                    .collect()
            })
            .collect()
    }

    pub fn result_set(&self) -> Result<ResultSet, FixtureError> {
        Ok(ResultSet::new(self.columns(), self.rows()?))
    }

    /// A driver that answers any query with this fixture's rows
    pub fn connector(&self) -> Result<MemoryConnector, FixtureError> {
        Ok(MemoryConnector::new().with_fallback(self.result_set()?))
    }
}

impl ShapeSpec {
    pub fn to_shape(&self) -> Result<EntityShape, FixtureError> {
        let mut shape = EntityShape::new(&self.name);
        if let Some(table) = &self.table {
            shape = shape.table(table);
        }
        if let Some(schema) = &self.schema {
            shape = shape.schema(schema);
        }
        for field in &self.fields {
            shape = shape.field(field.to_field(&self.name)?);
        }
        Ok(shape)
    }
}

impl FieldSpec {
    fn to_field(&self, entity: &str) -> Result<FieldShape, FixtureError> {
        let invalid = |reason: &str| FixtureError::Field {
            entity: entity.to_string(),
            field: self.name.clone(),
            reason: reason.to_string(),
        };

        let mut field = match (self.ty, &self.nested, &self.collection) {
            (Some(ty), None, None) => FieldShape::scalar(&self.name, ty),
            (None, Some(nested), None) => FieldShape::nested(&self.name, nested.to_shape()?),
            (None, None, Some(element)) => {
                FieldShape::collection(&self.name, element.to_shape()?)
            }
            (None, None, None) => return Err(invalid("needs one of type, nested or collection")),
            _ => return Err(invalid("only one of type, nested or collection may be set")),
        };

        if let Some(column) = &self.column {
            field = field.column(column);
        }
        if self.nullable {
            field = field.nullable();
        }
        if self.key {
            field = field.key();
        }
        if self.excluded {
            field = field.excluded();
        }
        Ok(field)
    }
}

fn parse_cell(cell: &Value, ty: Option<ScalarType>) -> Result<DbValue, String> {
    match (ty, cell) {
        (Some(ScalarType::Date), Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(DbValue::Date)
            .map_err(|e| format!("invalid date '{}': {}", s, e)),
        (Some(ScalarType::DateTime), Value::String(s)) => {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .map(DbValue::DateTime)
                .map_err(|e| format!("invalid datetime '{}': {}", s, e))
        }
        _ => Ok(DbValue::from_json(cell)),
    }
}
