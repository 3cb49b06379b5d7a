//! Column-level schema changes with row backfill.
//!
//! A change updates the registered definition and rewrites every stored row
//! of the type so rows always carry exactly the declared columns.

use tracing::info;

use crate::catalog::{AssociationKind, ColumnDef, EntityDef, SchemaRegistry};
use crate::error::Error;
use crate::storage::{Record, StorageEngine, StoredAttribute};

/// A change to one entity type's columns.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    /// Add a column; stored rows get its initial value.
    AddColumn { column: ColumnDef },
    /// Drop a column and its stored values.
    RemoveColumn { name: String },
    /// Rename a column, keeping stored values.
    RenameColumn { from: String, to: String },
}

impl SchemaChange {
    fn describe(&self) -> String {
        match self {
            SchemaChange::AddColumn { column } => format!("add column '{}'", column.name),
            SchemaChange::RemoveColumn { name } => format!("remove column '{}'", name),
            SchemaChange::RenameColumn { from, to } => {
                format!("rename column '{}' to '{}'", from, to)
            }
        }
    }
}

/// Applies schema changes to the registry and the stored rows.
pub struct Migrator<'a> {
    registry: &'a SchemaRegistry,
    storage: &'a StorageEngine,
}

impl<'a> Migrator<'a> {
    /// Create a migrator over a registry and a storage handle.
    pub fn new(registry: &'a SchemaRegistry, storage: &'a StorageEngine) -> Self {
        Self { registry, storage }
    }

    /// Apply a change, returning the number of rows rewritten.
    pub fn apply(&self, entity_type: &str, change: SchemaChange) -> Result<usize, Error> {
        let current = self.registry.get(entity_type)?;
        let next = self.plan(&current, &change)?;

        let mut rewritten = 0;
        let ids: Vec<u64> = self
            .storage
            .scan(entity_type)?
            .map(|row| row.map(|(id, _)| id))
            .collect::<Result<_, _>>()?;
        for id in ids {
            if let Some(record) = self.storage.get(entity_type, id)? {
                self.storage
                    .put(entity_type, id, &backfill(record, &change))?;
                rewritten += 1;
            }
        }

        self.registry.replace(next)?;
        info!(
            entity = %entity_type,
            change = %change.describe(),
            rows = rewritten,
            "Applied schema change"
        );
        Ok(rewritten)
    }

    /// Check the change and build the resulting definition.
    fn plan(&self, def: &EntityDef, change: &SchemaChange) -> Result<EntityDef, Error> {
        let mut next = def.clone();
        match change {
            SchemaChange::AddColumn { column } => {
                if def.get_column(&column.name).is_some() {
                    return Err(invalid(def, format!("column '{}' already exists", column.name)));
                }
                if !column.nullable
                    && column.default.is_none()
                    && self.storage.count(&def.name)? > 0
                {
                    return Err(invalid(
                        def,
                        format!(
                            "column '{}' is not null and has no default, but rows exist",
                            column.name
                        ),
                    ));
                }
                next.columns.push(column.clone());
            }
            SchemaChange::RemoveColumn { name } => {
                self.check_unused(def, name)?;
                next.columns.retain(|c| &c.name != name);
            }
            SchemaChange::RenameColumn { from, to } => {
                self.check_unused(def, from)?;
                if def.get_column(to).is_some() || ColumnDef::is_reserved(to) {
                    return Err(invalid(def, format!("column '{}' cannot be used", to)));
                }
                if let Some(column) = next.columns.iter_mut().find(|c| &c.name == from) {
                    column.name = to.clone();
                }
            }
        }
        SchemaRegistry::check_definition(&next)?;
        Ok(next)
    }

    /// Fail if the column is missing or still needed by a rule or an association.
    fn check_unused(&self, def: &EntityDef, column: &str) -> Result<(), Error> {
        if def.get_column(column).is_none() {
            return Err(Error::UnknownColumn {
                entity: def.name.clone(),
                column: column.to_string(),
            });
        }
        if def.column_in_use(column) {
            return Err(invalid(
                def,
                format!("column '{}' is used by a rule or an association", column),
            ));
        }

        for other in self.registry.definitions() {
            let owns_through_column = other.associations.iter().any(|a| {
                matches!(
                    &a.kind,
                    AssociationKind::OwnsMany { target, foreign_key }
                        if target == &def.name && foreign_key == column
                )
            });
            if owns_through_column {
                return Err(invalid(
                    def,
                    format!("column '{}' is the foreign key of an association on {}", column, other.name),
                ));
            }
        }
        Ok(())
    }
}

/// Rewrite one stored row for a change, keeping its timestamps.
fn backfill(mut record: Record, change: &SchemaChange) -> Record {
    match change {
        SchemaChange::AddColumn { column } => {
            if record.get(&column.name).is_none() {
                record.attributes.push(StoredAttribute {
                    name: column.name.clone(),
                    value: column.initial_value(),
                });
            }
        }
        SchemaChange::RemoveColumn { name } => {
            record.attributes.retain(|a| &a.name != name);
        }
        SchemaChange::RenameColumn { from, to } => {
            for attribute in record.attributes.iter_mut().filter(|a| &a.name == from) {
                attribute.name = to.clone();
            }
        }
    }
    record
}

fn invalid(def: &EntityDef, reason: String) -> Error {
    Error::InvalidSchema {
        entity: def.name.clone(),
        reason,
    }
}
