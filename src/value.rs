//! Loosely-typed column values and declared scalar field types
//!
//! Drivers hand rows over as `Vec<DbValue>`, with `DbValue::Null` standing in for SQL NULL.
//! Entity shapes declare a `ScalarType` per scalar field; hydration checks every non-null
//! value against it before assigning, then renders the value as JSON for decoding.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// One column value of one fetched row
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// JSON document column (stored as-is)
    Json(Value),
}

/// Declared type of a scalar entity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Bool,
    Int,
    UInt,
    Float,
    Text,
    Date,
    DateTime,
    Json,
    /// Accepts any column value
    Any,
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    /// Name of the runtime type, used in mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            DbValue::Null => "null",
            DbValue::Bool(_) => "bool",
            DbValue::Int(_) => "int",
            DbValue::UInt(_) => "uint",
            DbValue::Float(_) => "float",
            DbValue::Text(_) => "text",
            DbValue::Date(_) => "date",
            DbValue::DateTime(_) => "datetime",
            DbValue::Json(_) => "json",
        }
    }

    /// Convert a JSON scalar into a column value.
    ///
    /// Arrays and objects become `DbValue::Json`.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => DbValue::Null,
            Value::Bool(b) => DbValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DbValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    DbValue::UInt(u)
                } else {
                    DbValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => DbValue::Text(s.clone()),
            other => DbValue::Json(other.clone()),
        }
    }

    /// Render the value as JSON, coerced towards the declared field type.
    ///
    /// Callers check `ScalarType::accepts` first; this never fails.
    pub fn to_json(&self, target: ScalarType) -> Value {
        match (self, target) {
            (DbValue::Int(i), ScalarType::Bool) => Value::Bool(*i != 0),
            (DbValue::UInt(u), ScalarType::Bool) => Value::Bool(*u != 0),
            (DbValue::Int(i), ScalarType::Float) => float_json(*i as f64),
            (DbValue::UInt(u), ScalarType::Float) => float_json(*u as f64),
            (DbValue::Null, _) => Value::Null,
            (DbValue::Bool(b), _) => Value::Bool(*b),
            (DbValue::Int(i), _) => Value::Number((*i).into()),
            (DbValue::UInt(u), _) => Value::Number((*u).into()),
            (DbValue::Float(f), _) => float_json(*f),
            (DbValue::Text(s), ScalarType::Json) => {
                serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone()))
            }
            (DbValue::Text(s), _) => Value::String(s.clone()),
            (DbValue::Date(d), _) => Value::String(d.format("%Y-%m-%d").to_string()),
            (DbValue::DateTime(dt), _) => {
                Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            (DbValue::Json(v), _) => v.clone(),
        }
    }
}

fn float_json(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

impl ScalarType {
    /// Whether a non-null column value may be assigned to a field of this type
    pub fn accepts(self, value: &DbValue) -> bool {
        match (self, value) {
            (_, DbValue::Null) => true,
            (ScalarType::Any, _) => true,
            (ScalarType::Json, _) => true,
            (ScalarType::Bool, DbValue::Bool(_)) => true,
            // tinyint(1) style booleans
            (ScalarType::Bool, DbValue::Int(i)) => *i == 0 || *i == 1,
            (ScalarType::Bool, DbValue::UInt(u)) => *u <= 1,
            (ScalarType::Int, DbValue::Int(_)) => true,
            (ScalarType::Int, DbValue::UInt(u)) => i64::try_from(*u).is_ok(),
            (ScalarType::UInt, DbValue::UInt(_)) => true,
            (ScalarType::UInt, DbValue::Int(i)) => *i >= 0,
            (ScalarType::Float, DbValue::Float(_) | DbValue::Int(_) | DbValue::UInt(_)) => true,
            (ScalarType::Text, DbValue::Text(_)) => true,
            (ScalarType::Date, DbValue::Date(_)) => true,
            (ScalarType::DateTime, DbValue::DateTime(_)) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int => "int",
            ScalarType::UInt => "uint",
            ScalarType::Float => "float",
            ScalarType::Text => "text",
            ScalarType::Date => "date",
            ScalarType::DateTime => "datetime",
            ScalarType::Json => "json",
            ScalarType::Any => "any",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DbValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbValue::Null => f.write_str("NULL"),
            DbValue::Bool(b) => write!(f, "{}", b),
            DbValue::Int(i) => write!(f, "{}", i),
            DbValue::UInt(u) => write!(f, "{}", u),
            DbValue::Float(x) => write!(f, "{}", x),
            DbValue::Text(s) => f.write_str(s),
            DbValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            DbValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            DbValue::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for DbValue {
    fn from(value: bool) -> Self {
        DbValue::Bool(value)
    }
}

impl From<i32> for DbValue {
    fn from(value: i32) -> Self {
        DbValue::Int(value.into())
    }
}

impl From<i64> for DbValue {
    fn from(value: i64) -> Self {
        DbValue::Int(value)
    }
}

impl From<u32> for DbValue {
    fn from(value: u32) -> Self {
        DbValue::UInt(value.into())
    }
}

impl From<u64> for DbValue {
    fn from(value: u64) -> Self {
        DbValue::UInt(value)
    }
}

impl From<f64> for DbValue {
    fn from(value: f64) -> Self {
        DbValue::Float(value)
    }
}

impl From<&str> for DbValue {
    fn from(value: &str) -> Self {
        DbValue::Text(value.to_string())
    }
}

impl From<String> for DbValue {
    fn from(value: String) -> Self {
        DbValue::Text(value)
    }
}

impl From<NaiveDate> for DbValue {
    fn from(value: NaiveDate) -> Self {
        DbValue::Date(value)
    }
}

impl From<NaiveDateTime> for DbValue {
    fn from(value: NaiveDateTime) -> Self {
        DbValue::DateTime(value)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(DbValue::Null)
    }
}
