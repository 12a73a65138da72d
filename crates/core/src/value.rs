//! Column values and column types
//!
//! `ColumnValue` is the scalar exchanged with the relational substrate:
//! index rows are flattened into column values on write, predicate
//! operands are bound as column values, and rows read back are lifted
//! into JSON (guided by the declared `ColumnType`) before being
//! deserialized into typed index records.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::types::DocumentId;

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// UTF-8 text
    Text,
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Real,
    /// Boolean, stored as 0/1
    Boolean,
    /// Raw bytes
    Blob,
}

impl ColumnType {
    /// Name used in DDL statements
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Blob => "BLOB",
        }
    }

    /// Resolve a declared type name as reported by the catalog
    ///
    /// Follows SQLite's affinity rules loosely; unknown names fall back to `Text`.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("BOOL") {
            ColumnType::Boolean
        } else if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnType::Real
        } else if upper.contains("BLOB") {
            ColumnType::Blob
        } else {
            ColumnType::Text
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// A single scalar stored in or compared against a column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// SQL NULL
    Null,
    /// Integer (also carries booleans)
    Integer(i64),
    /// Float
    Real(f64),
    /// Text
    Text(String),
    /// Bytes
    Blob(Vec<u8>),
}

impl ColumnValue {
    /// Whether this value is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    /// Flatten a JSON value into a column value
    ///
    /// Arrays and objects are stored as their JSON text.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => ColumnValue::Null,
            JsonValue::Bool(b) => ColumnValue::Integer(i64::from(*b)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => ColumnValue::Integer(i),
                None => ColumnValue::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => ColumnValue::Text(s.clone()),
            nested => ColumnValue::Text(nested.to_string()),
        }
    }

    /// Lift a column value back into JSON using the declared column type
    pub fn into_json(self, ty: ColumnType) -> JsonValue {
        match (self, ty) {
            (ColumnValue::Null, _) => JsonValue::Null,
            (ColumnValue::Integer(i), ColumnType::Boolean) => JsonValue::Bool(i != 0),
            (ColumnValue::Integer(i), ColumnType::Real) => float_to_json(i as f64),
            (ColumnValue::Integer(i), _) => JsonValue::from(i),
            (ColumnValue::Real(f), _) => float_to_json(f),
            (ColumnValue::Text(s), _) => JsonValue::String(s),
            (ColumnValue::Blob(bytes), _) => {
                JsonValue::Array(bytes.into_iter().map(JsonValue::from).collect())
            }
        }
    }
}

fn float_to_json(f: f64) -> JsonValue {
    serde_json::Number::from_f64(f)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => f.write_str("NULL"),
            ColumnValue::Integer(i) => write!(f, "{}", i),
            ColumnValue::Real(r) => write!(f, "{}", r),
            ColumnValue::Text(s) => write!(f, "'{}'", s),
            ColumnValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for ColumnValue {
    fn from(s: &str) -> Self {
        ColumnValue::Text(s.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(s: String) -> Self {
        ColumnValue::Text(s)
    }
}

impl From<&String> for ColumnValue {
    fn from(s: &String) -> Self {
        ColumnValue::Text(s.clone())
    }
}

impl From<i64> for ColumnValue {
    fn from(i: i64) -> Self {
        ColumnValue::Integer(i)
    }
}

impl From<i32> for ColumnValue {
    fn from(i: i32) -> Self {
        ColumnValue::Integer(i64::from(i))
    }
}

impl From<u32> for ColumnValue {
    fn from(i: u32) -> Self {
        ColumnValue::Integer(i64::from(i))
    }
}

impl From<f64> for ColumnValue {
    fn from(f: f64) -> Self {
        ColumnValue::Real(f)
    }
}

impl From<bool> for ColumnValue {
    fn from(b: bool) -> Self {
        ColumnValue::Integer(i64::from(b))
    }
}

impl From<Vec<u8>> for ColumnValue {
    fn from(bytes: Vec<u8>) -> Self {
        ColumnValue::Blob(bytes)
    }
}

impl From<DocumentId> for ColumnValue {
    fn from(id: DocumentId) -> Self {
        ColumnValue::Integer(id.as_i64())
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ColumnValue::Null)
    }
}
