//! Database wrapper combining a schema registry and a storage engine.

use tracing::info;

use crate::association::Resolver;
use crate::catalog::{EntityDef, SchemaRegistry};
use crate::error::Error;
use crate::mapper::Mapper;
use crate::migration::Migrator;
use crate::storage::{StorageConfig, StorageEngine};

/// Owns a registry and a storage engine and hands out borrowing handles.
pub struct Database {
    registry: SchemaRegistry,
    storage: StorageEngine,
}

impl Database {
    /// Open a database with the given storage configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let storage = StorageEngine::open(config)?;
        if storage.was_recovered() {
            info!("Recovered existing store");
        }
        Ok(Self {
            registry: SchemaRegistry::new(),
            storage,
        })
    }

    /// Open a throwaway database.
    pub fn temporary() -> Result<Self, Error> {
        Self::open(StorageConfig::temporary())
    }

    /// Register an entity type.
    pub fn register(&self, def: EntityDef) -> Result<(), Error> {
        self.registry.register(def)
    }

    /// Get a reference to the schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Get a reference to the storage engine.
    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    /// Create an entity mapper.
    pub fn mapper(&self) -> Mapper<'_> {
        Mapper::new(&self.registry, &self.storage)
    }

    /// Create an association resolver.
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.registry, &self.storage)
    }

    /// Create a schema migrator.
    pub fn migrator(&self) -> Migrator<'_> {
        Migrator::new(&self.registry, &self.storage)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.storage.flush()
    }
}
