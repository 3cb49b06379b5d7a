//! recmap core - schema registry, entity mapper, associations and validations.
//!
//! Entities are untyped attribute maps checked against registered
//! definitions and persisted in an embedded sled store.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod association;
pub mod catalog;
pub mod database;
pub mod entity;
pub mod error;
pub mod mapper;
pub mod migration;
pub mod query;
pub mod storage;
pub mod validation;
pub mod value;

pub use association::Resolver;
pub use catalog::{
    AssociationDef, AssociationKind, ColumnDef, ColumnType, EntityDef, SchemaRegistry,
};
pub use database::Database;
pub use entity::Entity;
pub use error::{ConstraintError, Error};
pub use mapper::{Mapper, SaveOptions};
pub use migration::{Migrator, SchemaChange};
pub use query::{Filter, OrderBy, OrderDirection, Query};
pub use storage::{StorageConfig, StorageEngine};
pub use validation::{RuleKind, ValidationRule, Validator, Violations};
pub use value::Value;
