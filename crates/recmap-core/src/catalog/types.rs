//! Column type definitions.

use std::fmt;

use crate::value::Value;

/// Data types a column can declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// Short UTF-8 string.
    String,
    /// Long UTF-8 text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point.
    Float,
    /// Boolean.
    Boolean,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// Id of a row of the named entity type.
    Reference(String),
}

impl ColumnType {
    /// Check whether a non-null value fits this column type.
    ///
    /// Null is accepted by every type; nullability is a column property.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnType::String | ColumnType::Text, Value::String(_)) => true,
            (ColumnType::Integer, Value::Int(_)) => true,
            (ColumnType::Float, Value::Float(_) | Value::Int(_)) => true,
            (ColumnType::Boolean, Value::Bool(_)) => true,
            (ColumnType::Timestamp, Value::Timestamp(_)) => true,
            (ColumnType::Reference(_), Value::Int(i)) => *i >= 0,
            _ => false,
        }
    }

    /// Referenced entity type, for reference columns.
    pub fn referenced_entity(&self) -> Option<&str> {
        match self {
            ColumnType::Reference(entity) => Some(entity),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::String => write!(f, "string"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Timestamp => write!(f, "timestamp"),
            ColumnType::Reference(entity) => write!(f, "reference to {}", entity),
        }
    }
}
