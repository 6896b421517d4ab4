use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::DatabaseError;

/// A bound parameter or a decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Interprets a command-line argument: `null`, integers and floats keep
    /// their type, everything else is text.
    pub fn parse_arg(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("null") {
            return Value::Null;
        }
        if let Ok(v) = raw.parse::<i64>() {
            return Value::Integer(v);
        }
        if let Ok(v) = raw.parse::<f64>() {
            if v.is_finite() {
                return Value::Real(v);
            }
        }
        Value::Text(raw.to_string())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(v) => serializer.serialize_i64(*v),
            Value::Real(v) => serializer.serialize_f64(*v),
            Value::Text(v) => serializer.serialize_str(v),
            Value::Blob(v) => serializer.serialize_bytes(v),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Timestamp(v) => serializer.serialize_str(&v.to_rfc3339()),
        }
    }
}

/// One result row with its column names, in select-list order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Reads an integer column, typically a `COUNT(*)` or an id.
    pub fn get_i64(&self, name: &str) -> Result<i64, DatabaseError> {
        self.get_by_name(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| DatabaseError::Decode {
                column: name.to_string(),
                reason: "missing or not an integer".to_string(),
            })
    }

    pub fn get_str(&self, name: &str) -> Result<&str, DatabaseError> {
        self.get_by_name(name)
            .and_then(Value::as_str)
            .ok_or_else(|| DatabaseError::Decode {
                column: name.to_string(),
                reason: "missing or not text".to_string(),
            })
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Outcome of a write. `generated_id` is only set when the statement produced
/// a row identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    pub generated_id: Option<i64>,
    pub affected_rows: u64,
}

impl ExecResult {
    pub fn id_or_count(&self) -> i64 {
        self.generated_id
            .unwrap_or_else(|| i64::try_from(self.affected_rows).unwrap_or(i64::MAX))
    }
}
