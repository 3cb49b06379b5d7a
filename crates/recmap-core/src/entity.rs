//! In-memory entity instances.

use std::collections::{BTreeMap, HashMap};

use crate::storage::Record;
use crate::validation::Violations;
use crate::value::Value;

/// Associations already resolved on one entity instance.
#[derive(Debug, Clone)]
pub(crate) enum Loaded {
    /// A belongs-to parent, remembered with the foreign key it was read from.
    One {
        foreign_key: String,
        parent: Option<Box<Entity>>,
    },
    /// An owns-many or many-through sequence.
    Many(Vec<Entity>),
}

/// A record instance of a registered entity type.
///
/// Equality compares type, id and attributes; timestamps, errors and the
/// association cache are ignored.
#[derive(Debug, Clone)]
pub struct Entity {
    entity_type: String,
    id: Option<u64>,
    attributes: BTreeMap<String, Value>,
    created_at: Option<u64>,
    updated_at: Option<u64>,
    errors: Violations,
    loaded: HashMap<String, Loaded>,
}

impl Entity {
    /// Create an unsaved entity with no attributes.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: None,
            attributes: BTreeMap::new(),
            created_at: None,
            updated_at: None,
            errors: Violations::new(),
            loaded: HashMap::new(),
        }
    }

    /// Builder-style attribute assignment.
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(attribute, value);
        self
    }

    pub(crate) fn from_record(entity_type: &str, id: u64, record: Record) -> Self {
        let mut entity = Self::new(entity_type);
        entity.id = Some(id);
        entity.created_at = Some(record.created_at);
        entity.updated_at = Some(record.updated_at);
        entity.attributes = record
            .attributes
            .into_iter()
            .map(|a| (a.name, a.value))
            .collect();
        entity
    }

    /// Entity type name.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Row id, `None` until saved.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Check if the entity has a stored row.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Attribute value, if assigned.
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    /// Field value including the implicit `id`, `created_at` and `updated_at`.
    pub fn field(&self, name: &str) -> Value {
        match name {
            "id" => self.id.map(Value::from).unwrap_or(Value::Null),
            "created_at" => timestamp_value(self.created_at),
            "updated_at" => timestamp_value(self.updated_at),
            _ => self.attributes.get(name).cloned().unwrap_or(Value::Null),
        }
    }

    /// Assign an attribute.
    ///
    /// A cached belongs-to parent read through this attribute is dropped.
    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        let attribute = attribute.into();
        self.loaded.retain(|_, loaded| {
            !matches!(loaded, Loaded::One { foreign_key, .. } if *foreign_key == attribute)
        });
        self.attributes.insert(attribute, value.into());
    }

    /// All assigned attributes.
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Creation timestamp (microseconds since Unix epoch).
    pub fn created_at(&self) -> Option<u64> {
        self.created_at
    }

    /// Last update timestamp (microseconds since Unix epoch).
    pub fn updated_at(&self) -> Option<u64> {
        self.updated_at
    }

    /// Violations from the last validation run.
    pub fn errors(&self) -> &Violations {
        &self.errors
    }

    /// Forget every resolved association.
    pub fn reset_associations(&mut self) {
        self.loaded.clear();
    }

    /// Check whether an association was already resolved on this instance.
    pub fn is_loaded(&self, association: &str) -> bool {
        self.loaded.contains_key(association)
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.attributes
    }

    pub(crate) fn set_errors(&mut self, errors: Violations) {
        self.errors = errors;
    }

    pub(crate) fn mark_saved(&mut self, id: u64, created_at: u64, updated_at: u64) {
        self.id = Some(id);
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.id = None;
        self.created_at = None;
        self.updated_at = None;
        self.loaded.clear();
    }

    pub(crate) fn cached(&self, association: &str) -> Option<&Loaded> {
        self.loaded.get(association)
    }

    pub(crate) fn cache(&mut self, association: &str, loaded: Loaded) {
        self.loaded.insert(association.to_string(), loaded);
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.entity_type == other.entity_type
            && self.id == other.id
            && self.attributes == other.attributes
    }
}

fn timestamp_value(ts: Option<u64>) -> Value {
    ts.map(|t| Value::Timestamp(t as i64)).unwrap_or(Value::Null)
}
