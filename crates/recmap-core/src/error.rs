//! Core error types.

use thiserror::Error;

use crate::validation::Violations;

/// Record mapper errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Lookup by id found no row.
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Entity type.
        entity: String,
        /// Requested id.
        id: u64,
    },

    /// The entity failed one or more validation rules.
    #[error("validation failed: {0}")]
    ValidationFailed(Violations),

    /// The entity type was registered twice.
    #[error("entity type '{0}' is already registered")]
    DuplicateSchema(String),

    /// A persistence-time constraint was violated.
    #[error("constraint violation: {0}")]
    ConstraintViolation(#[from] ConstraintError),

    /// The entity type is not registered.
    #[error("unknown entity type '{0}'")]
    UnknownEntity(String),

    /// The attribute is not a declared column.
    #[error("unknown column '{column}' on {entity}")]
    UnknownColumn {
        /// Entity type.
        entity: String,
        /// Attribute name.
        column: String,
    },

    /// The association is not declared on the entity type.
    #[error("unknown association '{association}' on {entity}")]
    UnknownAssociation {
        /// Entity type.
        entity: String,
        /// Association name.
        association: String,
    },

    /// The association exists but has a different kind than requested.
    #[error("association '{association}' on {entity} is {actual}, not {expected}")]
    AssociationKind {
        /// Entity type.
        entity: String,
        /// Association name.
        association: String,
        /// Kind the caller asked for.
        expected: &'static str,
        /// Declared kind.
        actual: &'static str,
    },

    /// An association declaration breaks a registry invariant.
    #[error("invalid association '{association}' on {entity}: {reason}")]
    InvalidAssociation {
        /// Entity type.
        entity: String,
        /// Association name.
        association: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A schema definition or schema change is malformed.
    #[error("invalid schema for {entity}: {reason}")]
    InvalidSchema {
        /// Entity type.
        entity: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A value does not match the declared column type.
    #[error("type mismatch on {entity}.{column}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Entity type.
        entity: String,
        /// Column name.
        column: String,
        /// Declared column type.
        expected: String,
        /// Type of the supplied value.
        actual: &'static str,
    },

    /// The operation needs a persisted entity.
    #[error("{0} has not been saved yet")]
    NotPersisted(String),
}

/// Constraint violations detected while writing rows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintError {
    /// Another row already holds the value.
    #[error("unique constraint on {entity}.{column} violated by value {value}")]
    Unique {
        /// Entity type.
        entity: String,
        /// Column carrying the uniqueness rule.
        column: String,
        /// Conflicting value (scope values included).
        value: String,
    },

    /// A non-nullable column is null.
    #[error("{entity}.{column} cannot be null")]
    NotNull {
        /// Entity type.
        entity: String,
        /// Column name.
        column: String,
    },

    /// A reference column points at a missing row.
    #[error("{entity}.{column} references missing {references} with id {id}")]
    ForeignKey {
        /// Entity type holding the reference.
        entity: String,
        /// Reference column.
        column: String,
        /// Referenced entity type.
        references: String,
        /// Referenced id.
        id: u64,
    },

    /// The row is still referenced by other rows.
    #[error("cannot delete {entity} {id}: referenced by {count} {referencing_entity} row(s)")]
    Restrict {
        /// Entity type being deleted.
        entity: String,
        /// Id being deleted.
        id: u64,
        /// Entity type holding the references.
        referencing_entity: String,
        /// Number of referencing rows.
        count: usize,
    },
}
