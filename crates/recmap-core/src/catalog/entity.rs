//! Entity definitions.

use super::association::AssociationDef;
use super::column::ColumnDef;
use crate::validation::ValidationRule;

/// An entity type definition: columns, associations and validation rules.
#[derive(Debug, Clone)]
pub struct EntityDef {
    /// Entity type name (unique within the registry).
    pub name: String,
    /// Column definitions, in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Association definitions, in declaration order.
    pub associations: Vec<AssociationDef>,
    /// Validation rules, evaluated in declaration order.
    pub rules: Vec<ValidationRule>,
}

impl EntityDef {
    /// Create a new entity definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            associations: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Add a column.
    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Add an association.
    pub fn with_association(mut self, association: AssociationDef) -> Self {
        self.associations.push(association);
        self
    }

    /// Add a validation rule.
    pub fn validates(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Get a column by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get an association by name.
    pub fn get_association(&self, name: &str) -> Option<&AssociationDef> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Rules that need the unique index.
    pub fn unique_rules(&self) -> impl Iterator<Item = &ValidationRule> {
        self.rules.iter().filter(|r| r.is_uniqueness())
    }

    /// Reference columns pointing at `entity`.
    pub fn references_to<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a ColumnDef> {
        self.columns
            .iter()
            .filter(move |c| c.column_type.referenced_entity() == Some(entity))
    }

    /// Check whether a column is used by a rule or a belongs-to association.
    pub fn column_in_use(&self, column: &str) -> bool {
        self.rules.iter().any(|r| r.mentions(column))
            || self
                .associations
                .iter()
                .any(|a| a.owner_foreign_key() == Some(column))
    }
}
