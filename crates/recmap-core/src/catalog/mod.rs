//! Schema registry for entity types.
//!
//! The registry stores column definitions, associations and validation rules
//! for every entity type the mapper knows about.

mod association;
mod column;
mod entity;
mod registry;
mod types;

pub use association::{AssociationDef, AssociationKind};
pub use column::{ColumnDef, RESERVED_COLUMNS};
pub use entity::EntityDef;
pub use registry::SchemaRegistry;
pub use types::ColumnType;
