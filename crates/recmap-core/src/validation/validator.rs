//! Validation logic.
//!
//! The Validator evaluates every rule declared on an entity type against an
//! entity's in-memory state. Uniqueness rules consult the unique index.

use crate::catalog::EntityDef;
use crate::entity::Entity;
use crate::error::Error;
use crate::storage::StorageEngine;
use crate::value::Value;

use super::rule::{RuleKind, ValidationRule};
use super::violations::Violations;

/// Rule evaluator bound to a storage handle.
pub struct Validator<'a> {
    storage: &'a StorageEngine,
}

impl<'a> Validator<'a> {
    /// Create a new validator.
    pub fn new(storage: &'a StorageEngine) -> Self {
        Self { storage }
    }

    /// Evaluate all rules of `def` against `entity`.
    ///
    /// Returns the violation mapping; empty means valid.
    pub fn validate(&self, def: &EntityDef, entity: &Entity) -> Result<Violations, Error> {
        let mut violations = Violations::new();

        for rule in &def.rules {
            let value = entity.field(&rule.attribute);
            if !self.check_rule(def, entity, rule, &value)? {
                violations.add(rule.attribute.clone(), rule.failure_message());
            }
        }

        Ok(violations)
    }

    fn check_rule(
        &self,
        def: &EntityDef,
        entity: &Entity,
        rule: &ValidationRule,
        value: &Value,
    ) -> Result<bool, Error> {
        let passed = match &rule.kind {
            RuleKind::Presence => !value.is_blank(),
            RuleKind::Length { minimum } => char_length(value) >= *minimum,
            RuleKind::Format { pattern } => value.as_str().is_some_and(|s| pattern.is_match(s)),
            RuleKind::Uniqueness { scope } => {
                if value.is_null() {
                    true
                } else {
                    let scope_value = scope.as_deref().map(|s| entity.field(s));
                    let mut values = vec![value];
                    values.extend(scope_value.as_ref());

                    let holder = self.storage.unique_index().lookup(
                        &def.name,
                        &rule.attribute,
                        &values,
                    )?;
                    match holder {
                        Some(id) => Some(id) == entity.id(),
                        None => true,
                    }
                }
            }
        };
        Ok(passed)
    }
}

/// Character count of the value's string form; null counts as empty.
fn char_length(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::String(s) => s.chars().count(),
        other => other.to_string().chars().count(),
    }
}
