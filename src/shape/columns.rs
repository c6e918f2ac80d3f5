use serde::{Deserialize, Serialize};

/// Metadata of one result column, as reported by the store driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Column name as declared in its base table
    pub name: String,
    /// Declaring (base) table; `None` for computed columns
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    /// Position of the column within each fetched row
    pub ordinal: usize,
    #[serde(default)]
    pub is_key: bool,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, table: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            table: Some(table.into()),
            schema: None,
            ordinal,
            is_key: false,
        }
    }

    /// Column without table provenance (expressions, aggregates)
    pub fn computed(name: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            table: None,
            schema: None,
            ordinal,
            is_key: false,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }

    /// Whether this column belongs to `table` (and `schema`, when one is declared)
    pub fn belongs_to(&self, schema: Option<&str>, table: &str) -> bool {
        let schema_matches = match schema {
            Some(s) => self.schema.as_deref() == Some(s),
            None => true,
        };
        schema_matches && self.table.as_deref() == Some(table)
    }
}
