//! Column definitions for entities.

use super::types::ColumnType;
use crate::value::Value;

/// Column names every entity carries implicitly.
pub const RESERVED_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

/// A column definition within an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column data type.
    pub column_type: ColumnType,
    /// Whether the column accepts null.
    pub nullable: bool,
    /// Value filled in when the attribute is never assigned.
    pub default: Option<Value>,
}

impl ColumnDef {
    /// Create a new nullable column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
        }
    }

    /// Create a string column.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::String)
    }

    /// Create an integer column.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    /// Create a reference column holding ids of `entity`.
    pub fn reference(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Reference(entity.into()))
    }

    /// Reject null values.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Value an unassigned attribute starts with.
    pub fn initial_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }

    /// Check if the name collides with an implicit column.
    pub fn is_reserved(name: &str) -> bool {
        RESERVED_COLUMNS.contains(&name)
    }
}
