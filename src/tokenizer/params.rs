//! Named parameter values bound to a query

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use super::errors::BindError;
use crate::value::DbValue;

/// Bound parameters, looked up by the name following `:` in query text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: HashMap<String, DbValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style bind
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<DbValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<DbValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&DbValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bind every field of a serializable struct or map.
    ///
    /// Strings, numbers, booleans and nulls map onto the matching `DbValue`;
    /// nested arrays/objects are bound as JSON documents. Date/time fields
    /// serialize as strings this way, so bind them with [`Params::bind`] when
    /// the `yyyy-MM-dd HH:mm:ss` rendering is needed.
    pub fn from_serialize<T: Serialize + ?Sized>(source: &T) -> Result<Self, BindError> {
        let value = serde_json::to_value(source).map_err(|e| BindError::NotAMap(e.to_string()))?;
        match value {
            Value::Object(map) => Ok(Self {
                values: map
                    .iter()
                    .map(|(name, v)| (name.clone(), DbValue::from_json(v)))
                    .collect(),
            }),
            Value::Null => Ok(Self::default()),
            other => Err(BindError::NotAMap(format!("got {}", other))),
        }
    }
}

impl From<HashMap<String, DbValue>> for Params {
    fn from(values: HashMap<String, DbValue>) -> Self {
        Self { values }
    }
}

impl From<HashMap<String, Value>> for Params {
    fn from(values: HashMap<String, Value>) -> Self {
        Self {
            values: values
                .iter()
                .map(|(name, v)| (name.clone(), DbValue::from_json(v)))
                .collect(),
        }
    }
}
