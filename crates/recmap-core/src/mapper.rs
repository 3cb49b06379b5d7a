//! Entity mapper: translates between in-memory entities and stored rows.
//!
//! The mapper is a thin handle over a registry and a storage engine. Every
//! write goes through the same persistence checks; validation rules run in
//! front of them unless the caller opts out with [`SaveOptions`].

use tracing::{debug, warn};

use crate::catalog::{ColumnDef, EntityDef, SchemaRegistry};
use crate::entity::Entity;
use crate::error::{ConstraintError, Error};
use crate::query::{Filter, Query};
use crate::storage::key::current_timestamp;
use crate::storage::{Record, StorageEngine};
use crate::validation::{ValidationRule, Validator};
use crate::value::Value;

/// Options for a single save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Run validation rules before writing.
    pub validate: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

impl SaveOptions {
    /// Skip validation rules; persistence checks still apply.
    pub fn skip_validation() -> Self {
        Self { validate: false }
    }
}

/// Loads, saves and deletes entities of registered types.
pub struct Mapper<'a> {
    registry: &'a SchemaRegistry,
    storage: &'a StorageEngine,
}

impl<'a> Mapper<'a> {
    /// Create a mapper over a registry and a storage handle.
    pub fn new(registry: &'a SchemaRegistry, storage: &'a StorageEngine) -> Self {
        Self { registry, storage }
    }

    /// Build an unsaved entity, filling declared defaults.
    pub fn build<K, V>(
        &self,
        entity_type: &str,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Entity, Error>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let def = self.registry.get(entity_type)?;
        let mut entity = Entity::new(entity_type);
        fill_defaults(&def, &mut entity);
        assign(&def, &mut entity, attributes)?;
        Ok(entity)
    }

    /// Load one entity by id.
    pub fn load(&self, entity_type: &str, id: u64) -> Result<Entity, Error> {
        self.registry.get(entity_type)?;
        match self.storage.get(entity_type, id)? {
            Some(record) => Ok(Entity::from_record(entity_type, id, record)),
            None => Err(Error::NotFound {
                entity: entity_type.to_string(),
                id,
            }),
        }
    }

    /// Load every entity of a type, ordered by id.
    pub fn load_all(&self, entity_type: &str) -> Result<Vec<Entity>, Error> {
        self.registry.get(entity_type)?;
        self.storage
            .scan(entity_type)?
            .map(|row| row.map(|(id, record)| Entity::from_record(entity_type, id, record)))
            .collect()
    }

    /// Run a finder query.
    ///
    /// Fails with `UnknownColumn` if the query names an undeclared field.
    pub fn query(&self, entity_type: &str, query: &Query) -> Result<Vec<Entity>, Error> {
        let def = self.registry.get(entity_type)?;
        for field in query.fields() {
            if !ColumnDef::is_reserved(field) && def.get_column(field).is_none() {
                return Err(unknown_column(&def, field));
            }
        }
        Ok(query.apply(self.load_all(entity_type)?))
    }

    /// First entity (by id) matching a filter.
    pub fn find_by(&self, entity_type: &str, filter: Filter) -> Result<Option<Entity>, Error> {
        let query = Query::matching(filter).limit(1);
        Ok(self.query(entity_type, &query)?.into_iter().next())
    }

    /// Number of stored rows of a type.
    pub fn count(&self, entity_type: &str) -> Result<usize, Error> {
        self.registry.get(entity_type)?;
        self.storage.count(entity_type)
    }

    /// Entity with the lowest id.
    pub fn first(&self, entity_type: &str) -> Result<Option<Entity>, Error> {
        self.registry.get(entity_type)?;
        Ok(self
            .storage
            .first(entity_type)?
            .map(|(id, record)| Entity::from_record(entity_type, id, record)))
    }

    /// Entity with the highest id.
    pub fn last(&self, entity_type: &str) -> Result<Option<Entity>, Error> {
        self.registry.get(entity_type)?;
        Ok(self
            .storage
            .last(entity_type)?
            .map(|(id, record)| Entity::from_record(entity_type, id, record)))
    }

    /// Fresh copy of a persisted entity, with an empty association cache.
    pub fn reload(&self, entity: &Entity) -> Result<Entity, Error> {
        let id = entity
            .id()
            .ok_or_else(|| Error::NotPersisted(entity.entity_type().to_string()))?;
        self.load(entity.entity_type(), id)
    }

    /// Run validations and store the violations on the entity.
    pub fn valid(&self, entity: &mut Entity) -> Result<bool, Error> {
        let def = self.registry.get(entity.entity_type())?;
        let violations = Validator::new(self.storage).validate(&def, entity)?;
        let valid = violations.is_empty();
        entity.set_errors(violations);
        Ok(valid)
    }

    /// Validate and write.
    ///
    /// Returns `Ok(false)` without touching storage when a rule fails; the
    /// violations are left on the entity.
    pub fn save(&self, entity: &mut Entity) -> Result<bool, Error> {
        self.save_with(entity, SaveOptions::default())
    }

    /// Validate and write, escalating a rule failure to `ValidationFailed`.
    pub fn save_strict(&self, entity: &mut Entity) -> Result<(), Error> {
        if self.save(entity)? {
            Ok(())
        } else {
            Err(Error::ValidationFailed(entity.errors().clone()))
        }
    }

    /// Write with explicit options.
    pub fn save_with(&self, entity: &mut Entity, options: SaveOptions) -> Result<bool, Error> {
        let def = self.registry.get(entity.entity_type())?;
        fill_defaults(&def, entity);

        if options.validate && !self.valid(entity)? {
            warn!(
                entity = %def.name,
                id = ?entity.id(),
                errors = %entity.errors(),
                "Save blocked by validation"
            );
            return Ok(false);
        }

        self.persist(&def, entity)?;
        Ok(true)
    }

    /// Build and save. The entity is returned even when validation fails.
    pub fn create<K, V>(
        &self,
        entity_type: &str,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Entity, Error>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut entity = self.build(entity_type, attributes)?;
        self.save(&mut entity)?;
        Ok(entity)
    }

    /// Assign attributes and save.
    pub fn update<K, V>(
        &self,
        entity: &mut Entity,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<bool, Error>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let def = self.registry.get(entity.entity_type())?;
        assign(&def, entity, attributes)?;
        self.save(entity)
    }

    /// Delete the entity's row and release its unique values.
    ///
    /// The entity becomes unsaved again.
    pub fn delete(&self, entity: &mut Entity) -> Result<(), Error> {
        let def = self.registry.get(entity.entity_type())?;
        let id = entity
            .id()
            .ok_or_else(|| Error::NotPersisted(def.name.clone()))?;

        let record = self.storage.get(&def.name, id)?.ok_or_else(|| Error::NotFound {
            entity: def.name.clone(),
            id,
        })?;

        self.check_not_referenced(&def.name, id)?;

        for rule in def.unique_rules() {
            if let Some(values) = unique_values(rule, |name| record_field(&record, name)) {
                let refs: Vec<&Value> = values.iter().collect();
                self.storage
                    .unique_index()
                    .remove(&def.name, &rule.attribute, &refs, id)?;
            }
        }
        self.storage.remove(&def.name, id)?;
        entity.mark_deleted();

        debug!(entity = %def.name, id, "Deleted entity");
        Ok(())
    }

    /// Delete every entity of a type, returning how many were removed.
    pub fn delete_all(&self, entity_type: &str) -> Result<usize, Error> {
        let mut removed = 0;
        for mut entity in self.load_all(entity_type)? {
            self.delete(&mut entity)?;
            removed += 1;
        }
        Ok(removed)
    }

    fn persist(&self, def: &EntityDef, entity: &mut Entity) -> Result<(), Error> {
        self.check_row(def, entity)?;

        let now = current_timestamp();
        let (id, created_at, previous) = match entity.id() {
            Some(id) => {
                let previous = self.storage.get(&def.name, id)?.ok_or_else(|| Error::NotFound {
                    entity: def.name.clone(),
                    id,
                })?;
                (id, previous.created_at, Some(previous))
            }
            None => (self.storage.next_id(&def.name)?, now, None),
        };

        let (claimed, stale) = self.claim_unique(def, entity, id, previous.as_ref())?;

        let record = Record::new(
            entity
                .attributes()
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
            created_at,
            now,
        );
        if let Err(err) = self.storage.put(&def.name, id, &record) {
            self.release(def, &claimed, id)?;
            return Err(err);
        }
        self.release(def, &stale, id)?;
        entity.mark_saved(id, created_at, now);

        debug!(
            entity = %def.name,
            id,
            created = previous.is_none(),
            "Saved entity"
        );
        Ok(())
    }

    /// Column, null and reference checks applied to every write.
    fn check_row(&self, def: &EntityDef, entity: &Entity) -> Result<(), Error> {
        for (name, value) in entity.attributes() {
            let column = check_value(def, name, value)?;

            if value.is_null() {
                if !column.nullable {
                    return Err(ConstraintError::NotNull {
                        entity: def.name.clone(),
                        column: name.clone(),
                    }
                    .into());
                }
                continue;
            }

            if let (Some(target), Some(id)) = (column.column_type.referenced_entity(), value.as_id())
            {
                if !self.storage.contains(target, id)? {
                    return Err(ConstraintError::ForeignKey {
                        entity: def.name.clone(),
                        column: name.clone(),
                        references: target.to_string(),
                        id,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Claim unique index entries for the new values.
    ///
    /// Returns the entries claimed and the stale entries of the previous row,
    /// which the caller releases once the row is written. On a conflict every
    /// entry claimed by this save is released again.
    fn claim_unique<'d>(
        &self,
        def: &'d EntityDef,
        entity: &Entity,
        id: u64,
        previous: Option<&Record>,
    ) -> Result<(IndexEntries<'d>, IndexEntries<'d>), Error> {
        let index = self.storage.unique_index();
        let mut claimed: IndexEntries<'d> = Vec::new();
        let mut stale: IndexEntries<'d> = Vec::new();

        for rule in def.unique_rules() {
            let current = unique_values(rule, |name| entity.field(name));
            let old = previous.and_then(|record| unique_values(rule, |name| record_field(record, name)));
            if current == old {
                continue;
            }

            if let Some(values) = current {
                let refs: Vec<&Value> = values.iter().collect();
                if let Err(err) = index.insert(&def.name, &rule.attribute, &refs, id) {
                    self.release(def, &claimed, id)?;
                    return Err(err);
                }
                claimed.push((rule, values));
            }
            if let Some(values) = old {
                stale.push((rule, values));
            }
        }
        Ok((claimed, stale))
    }

    fn release(&self, def: &EntityDef, entries: &IndexEntries<'_>, id: u64) -> Result<(), Error> {
        let index = self.storage.unique_index();
        for (rule, values) in entries {
            let refs: Vec<&Value> = values.iter().collect();
            index.remove(&def.name, &rule.attribute, &refs, id)?;
        }
        Ok(())
    }

    /// Fail with `Restrict` if any reference column still points at the row.
    fn check_not_referenced(&self, entity_type: &str, id: u64) -> Result<(), Error> {
        let target = Value::from(id);
        for def in self.registry.definitions() {
            for column in def.references_to(entity_type) {
                let mut count = 0;
                for row in self.storage.scan(&def.name)? {
                    let (row_id, record) = row?;
                    if def.name == entity_type && row_id == id {
                        continue;
                    }
                    if record.get(&column.name).is_some_and(|v| v.loose_eq(&target)) {
                        count += 1;
                    }
                }
                if count > 0 {
                    return Err(ConstraintError::Restrict {
                        entity: entity_type.to_string(),
                        id,
                        referencing_entity: def.name.clone(),
                        count,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// Unique index entries of one row: a uniqueness rule and its key values.
type IndexEntries<'d> = Vec<(&'d ValidationRule, Vec<Value>)>;

/// Give every unassigned declared column its initial value.
fn fill_defaults(def: &EntityDef, entity: &mut Entity) {
    let attributes = entity.attributes_mut();
    for column in &def.columns {
        attributes
            .entry(column.name.clone())
            .or_insert_with(|| column.initial_value());
    }
}

/// Check and assign attributes.
fn assign<K, V>(
    def: &EntityDef,
    entity: &mut Entity,
    attributes: impl IntoIterator<Item = (K, V)>,
) -> Result<(), Error>
where
    K: Into<String>,
    V: Into<Value>,
{
    for (name, value) in attributes {
        let name = name.into();
        let value = value.into();
        check_value(def, &name, &value)?;
        entity.set(name, value);
    }
    Ok(())
}

/// Check that `name` is a declared column accepting `value`.
fn check_value<'d>(def: &'d EntityDef, name: &str, value: &Value) -> Result<&'d ColumnDef, Error> {
    let column = def
        .get_column(name)
        .ok_or_else(|| unknown_column(def, name))?;
    if !column.column_type.accepts(value) {
        return Err(Error::TypeMismatch {
            entity: def.name.clone(),
            column: name.to_string(),
            expected: column.column_type.to_string(),
            actual: value.type_name(),
        });
    }
    Ok(column)
}

fn unknown_column(def: &EntityDef, column: &str) -> Error {
    Error::UnknownColumn {
        entity: def.name.clone(),
        column: column.to_string(),
    }
}

fn record_field(record: &Record, name: &str) -> Value {
    record.get(name).cloned().unwrap_or(Value::Null)
}

/// Index values of a uniqueness rule, `None` when the attribute is null.
fn unique_values(rule: &ValidationRule, field: impl Fn(&str) -> Value) -> Option<Vec<Value>> {
    let value = field(&rule.attribute);
    if value.is_null() {
        return None;
    }
    let mut values = vec![value];
    if let Some(scope) = rule.scope() {
        values.push(field(scope));
    }
    Some(values)
}
