//! Association resolver.
//!
//! Related entities are materialized on first access and cached on the
//! entity instance that asked for them:
//! - belongs-to: one parent read through the owner's foreign key
//! - owns-many: every child whose foreign key holds the owner id
//! - many-through: the far-side parent of every join row owned by the owner

use tracing::debug;

use crate::catalog::{AssociationDef, AssociationKind, SchemaRegistry};
use crate::entity::{Entity, Loaded};
use crate::error::Error;
use crate::storage::StorageEngine;
use crate::value::Value;

/// Resolves declared associations against stored rows.
pub struct Resolver<'a> {
    registry: &'a SchemaRegistry,
    storage: &'a StorageEngine,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over a registry and a storage handle.
    pub fn new(registry: &'a SchemaRegistry, storage: &'a StorageEngine) -> Self {
        Self { registry, storage }
    }

    /// Resolve a belongs-to association.
    ///
    /// A null foreign key resolves to `None`.
    pub fn one<'e>(&self, entity: &'e mut Entity, name: &str) -> Result<Option<&'e Entity>, Error> {
        let association = self.registry.association(entity.entity_type(), name)?;
        let (target, foreign_key) = match &association.kind {
            AssociationKind::BelongsTo {
                target,
                foreign_key,
            } => (target, foreign_key),
            _ => return Err(kind_error(entity, &association, "belongs-to")),
        };

        if !entity.is_loaded(name) {
            let parent = match entity.field(foreign_key).as_id() {
                Some(id) => self.fetch(target, id)?.map(Box::new),
                None => None,
            };
            debug!(
                entity = %entity.entity_type(),
                association = %name,
                found = parent.is_some(),
                "Resolved belongs-to association"
            );
            entity.cache(
                name,
                Loaded::One {
                    foreign_key: foreign_key.clone(),
                    parent,
                },
            );
        }

        match entity.cached(name) {
            Some(Loaded::One { parent, .. }) => Ok(parent.as_deref()),
            _ => Ok(None),
        }
    }

    /// Resolve an owns-many or many-through association.
    ///
    /// An unsaved owner has no related rows; nothing is cached for it.
    pub fn many<'e>(&self, entity: &'e mut Entity, name: &str) -> Result<&'e [Entity], Error> {
        let association = self.registry.association(entity.entity_type(), name)?;
        if !association.is_collection() {
            return Err(kind_error(entity, &association, "a collection"));
        }

        let Some(owner_id) = entity.id() else {
            return Ok(&[]);
        };

        if !entity.is_loaded(name) {
            let rows = match &association.kind {
                AssociationKind::OwnsMany {
                    target,
                    foreign_key,
                } => self.children(target, foreign_key, owner_id)?,
                AssociationKind::ManyThrough { through, source } => {
                    self.through(entity.entity_type(), through, source, owner_id)?
                }
                AssociationKind::BelongsTo { .. } => Vec::new(),
            };
            debug!(
                entity = %entity.entity_type(),
                id = owner_id,
                association = %name,
                count = rows.len(),
                "Resolved collection association"
            );
            entity.cache(name, Loaded::Many(rows));
        }

        match entity.cached(name) {
            Some(Loaded::Many(rows)) => Ok(rows.as_slice()),
            _ => Ok(&[]),
        }
    }

    /// Point a belongs-to association at `parent`.
    ///
    /// Writes the foreign key and caches the parent on the child; the child
    /// still has to be saved.
    pub fn assign(&self, child: &mut Entity, name: &str, parent: &Entity) -> Result<(), Error> {
        let association = self.registry.association(child.entity_type(), name)?;
        let (target, foreign_key) = match &association.kind {
            AssociationKind::BelongsTo {
                target,
                foreign_key,
            } => (target, foreign_key),
            _ => return Err(kind_error(child, &association, "belongs-to")),
        };

        if parent.entity_type() != target {
            return Err(Error::InvalidAssociation {
                entity: child.entity_type().to_string(),
                association: name.to_string(),
                reason: format!("expected a {}, got a {}", target, parent.entity_type()),
            });
        }
        let parent_id = parent
            .id()
            .ok_or_else(|| Error::NotPersisted(parent.entity_type().to_string()))?;

        child.set(foreign_key.clone(), parent_id);
        child.cache(
            name,
            Loaded::One {
                foreign_key: foreign_key.clone(),
                parent: Some(Box::new(parent.clone())),
            },
        );
        Ok(())
    }

    fn fetch(&self, entity_type: &str, id: u64) -> Result<Option<Entity>, Error> {
        Ok(self
            .storage
            .get(entity_type, id)?
            .map(|record| Entity::from_record(entity_type, id, record)))
    }

    /// Rows of `entity_type` whose `foreign_key` holds `owner_id`, in id order.
    fn children(&self, entity_type: &str, foreign_key: &str, owner_id: u64) -> Result<Vec<Entity>, Error> {
        self.registry.get(entity_type)?;
        let owner = Value::from(owner_id);

        let mut rows = Vec::new();
        for row in self.storage.scan(entity_type)? {
            let (id, record) = row?;
            if record.get(foreign_key).is_some_and(|v| v.loose_eq(&owner)) {
                rows.push(Entity::from_record(entity_type, id, record));
            }
        }
        Ok(rows)
    }

    /// Far-side rows reached through the join rows owned by `owner_id`.
    ///
    /// One entry per join row, in join row order.
    fn through(
        &self,
        owner_type: &str,
        through: &str,
        source: &str,
        owner_id: u64,
    ) -> Result<Vec<Entity>, Error> {
        let through_def = self.registry.association(owner_type, through)?;
        let (join_type, join_key) = match &through_def.kind {
            AssociationKind::OwnsMany {
                target,
                foreign_key,
            } => (target, foreign_key),
            _ => {
                return Err(Error::AssociationKind {
                    entity: owner_type.to_string(),
                    association: through.to_string(),
                    expected: "owns-many",
                    actual: through_def.kind_name(),
                })
            }
        };

        let source_def = self.registry.association(join_type, source)?;
        let (far_type, far_key) = match &source_def.kind {
            AssociationKind::BelongsTo {
                target,
                foreign_key,
            } => (target, foreign_key),
            _ => {
                return Err(Error::AssociationKind {
                    entity: join_type.clone(),
                    association: source.to_string(),
                    expected: "belongs-to",
                    actual: source_def.kind_name(),
                })
            }
        };

        let mut rows = Vec::new();
        for join_row in self.children(join_type, join_key, owner_id)? {
            if let Some(far_id) = join_row.field(far_key).as_id() {
                if let Some(far) = self.fetch(far_type, far_id)? {
                    rows.push(far);
                }
            }
        }
        Ok(rows)
    }
}

fn kind_error(entity: &Entity, association: &AssociationDef, expected: &'static str) -> Error {
    Error::AssociationKind {
        entity: entity.entity_type().to_string(),
        association: association.name.clone(),
        expected,
        actual: association.kind_name(),
    }
}
