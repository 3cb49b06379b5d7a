//! Schema registry holding every registered entity type.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::{AssociationDef, AssociationKind, ColumnDef, EntityDef};
use crate::error::Error;

/// Registry of entity definitions, keyed by entity type name.
#[derive(Default)]
pub struct SchemaRegistry {
    entities: RwLock<HashMap<String, Arc<EntityDef>>>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type.
    ///
    /// Fails with `DuplicateSchema` if the type is already registered.
    pub fn register(&self, def: EntityDef) -> Result<(), Error> {
        let mut entities = self.entities.write();
        if entities.contains_key(&def.name) {
            return Err(Error::DuplicateSchema(def.name));
        }

        Self::check_definition(&def)?;
        for (position, association) in def.associations.iter().enumerate() {
            Self::check_association(&entities, &def, position, association)?;
        }

        info!(
            entity = %def.name,
            columns = def.columns.len(),
            associations = def.associations.len(),
            rules = def.rules.len(),
            "Registered entity type"
        );
        entities.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    /// Declare an association on an already registered type.
    pub fn add_association(&self, entity: &str, association: AssociationDef) -> Result<(), Error> {
        let mut entities = self.entities.write();
        let current = entities
            .get(entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))?;

        let mut def = EntityDef::clone(current);
        def.associations.push(association);
        let position = def.associations.len() - 1;
        Self::check_association(&entities, &def, position, &def.associations[position])?;

        info!(
            entity = %entity,
            association = %def.associations[position].name,
            "Added association"
        );
        entities.insert(entity.to_string(), Arc::new(def));
        Ok(())
    }

    /// Swap in a new definition for a registered type.
    pub fn replace(&self, def: EntityDef) -> Result<(), Error> {
        Self::check_definition(&def)?;

        let mut entities = self.entities.write();
        if !entities.contains_key(&def.name) {
            return Err(Error::UnknownEntity(def.name));
        }
        entities.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    /// Get an entity definition.
    pub fn get(&self, entity: &str) -> Result<Arc<EntityDef>, Error> {
        self.entities
            .read()
            .get(entity)
            .cloned()
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))
    }

    /// Check whether a type is registered.
    pub fn contains(&self, entity: &str) -> bool {
        self.entities.read().contains_key(entity)
    }

    /// Columns of a registered type.
    pub fn columns(&self, entity: &str) -> Result<Vec<ColumnDef>, Error> {
        Ok(self.get(entity)?.columns.clone())
    }

    /// Associations of a registered type.
    pub fn associations(&self, entity: &str) -> Result<Vec<AssociationDef>, Error> {
        Ok(self.get(entity)?.associations.clone())
    }

    /// One association of a registered type.
    pub fn association(&self, entity: &str, name: &str) -> Result<AssociationDef, Error> {
        self.get(entity)?
            .get_association(name)
            .cloned()
            .ok_or_else(|| Error::UnknownAssociation {
                entity: entity.to_string(),
                association: name.to_string(),
            })
    }

    /// Validation rules of a registered type.
    pub fn rules(&self, entity: &str) -> Result<Vec<crate::validation::ValidationRule>, Error> {
        Ok(self.get(entity)?.rules.clone())
    }

    /// All registered definitions.
    pub fn definitions(&self) -> Vec<Arc<EntityDef>> {
        self.entities.read().values().cloned().collect()
    }

    /// Registered type names, sorted.
    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Column and rule checks shared by registration and schema changes.
    pub(crate) fn check_definition(def: &EntityDef) -> Result<(), Error> {
        Self::check_columns(def)?;
        Self::check_rules(def)
    }

    fn check_columns(def: &EntityDef) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for column in &def.columns {
            if ColumnDef::is_reserved(&column.name) {
                return Err(invalid_schema(def, format!("'{}' is a reserved column", column.name)));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(invalid_schema(def, format!("column '{}' declared twice", column.name)));
            }
            if let Some(default) = &column.default {
                if !column.column_type.accepts(default) {
                    return Err(invalid_schema(
                        def,
                        format!("default for '{}' is not a {}", column.name, column.column_type),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_rules(def: &EntityDef) -> Result<(), Error> {
        for rule in &def.rules {
            for column in rule.columns() {
                if def.get_column(column).is_none() {
                    return Err(invalid_schema(
                        def,
                        format!("rule on '{}' names undeclared column '{}'", rule.attribute, column),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Check one association against the definition it belongs to.
    ///
    /// `position` is the association's index in `def.associations`; a
    /// many-through association may only use associations declared before it.
    fn check_association(
        entities: &HashMap<String, Arc<EntityDef>>,
        def: &EntityDef,
        position: usize,
        association: &AssociationDef,
    ) -> Result<(), Error> {
        let reject = |reason: String| Error::InvalidAssociation {
            entity: def.name.clone(),
            association: association.name.clone(),
            reason,
        };

        if def.associations[..position]
            .iter()
            .any(|a| a.name == association.name)
        {
            return Err(reject("declared twice".to_string()));
        }

        match &association.kind {
            AssociationKind::BelongsTo { foreign_key, .. } => {
                if def.get_column(foreign_key).is_none() {
                    return Err(reject(format!("foreign key column '{}' is not declared", foreign_key)));
                }
            }
            AssociationKind::OwnsMany { target, foreign_key } => {
                // The child type may be registered later; check it only when present.
                if let Some(child) = entities.get(target) {
                    if child.get_column(foreign_key).is_none() {
                        return Err(reject(format!(
                            "{} has no column '{}'",
                            target, foreign_key
                        )));
                    }
                }
            }
            AssociationKind::ManyThrough { through, source } => {
                let through_def = def.associations[..position]
                    .iter()
                    .find(|a| &a.name == through)
                    .ok_or_else(|| {
                        reject(format!("'{}' must be declared before this association", through))
                    })?;

                let (join, join_key) = match &through_def.kind {
                    AssociationKind::OwnsMany { target, foreign_key } => (target, foreign_key),
                    _ => {
                        return Err(reject(format!(
                            "'{}' is {}, expected owns-many",
                            through,
                            through_def.kind_name()
                        )))
                    }
                };

                let join_def = entities
                    .get(join)
                    .ok_or_else(|| reject(format!("join entity '{}' is not registered", join)))?;

                let back_reference = join_def.associations.iter().any(|a| {
                    matches!(
                        &a.kind,
                        AssociationKind::BelongsTo { target, foreign_key }
                            if target == &def.name && foreign_key == join_key
                    )
                });
                if !back_reference {
                    return Err(reject(format!(
                        "{} has no belongs-to association to {} on '{}'",
                        join, def.name, join_key
                    )));
                }

                match join_def.get_association(source).map(|a| &a.kind) {
                    Some(AssociationKind::BelongsTo { .. }) => {}
                    Some(_) => {
                        return Err(reject(format!(
                            "source '{}' on {} is not a belongs-to association",
                            source, join
                        )))
                    }
                    None => {
                        return Err(reject(format!("{} has no association '{}'", join, source)))
                    }
                }
            }
        }
        Ok(())
    }
}

fn invalid_schema(def: &EntityDef, reason: String) -> Error {
    Error::InvalidSchema {
        entity: def.name.clone(),
        reason,
    }
}
