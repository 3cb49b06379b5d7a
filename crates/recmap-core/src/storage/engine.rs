//! Storage engine implementation.

use super::key::{decode_id, encode_id, rows_tree_name, sequence_key};
use super::{Record, StorageConfig, UniqueIndex};
use crate::error::Error;
use sled::{Db, Tree};
use tracing::debug;

/// Tree name for metadata (id sequences).
const META_TREE: &str = "meta";

/// The row store wrapping sled.
///
/// Each entity type gets its own tree keyed by big-endian row id.
pub struct StorageEngine {
    /// The underlying sled database.
    db: Db,

    /// Tree for metadata.
    meta_tree: Tree,

    /// Unique index shared by every entity type.
    unique_index: UniqueIndex,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let sled_config = config.to_sled_config();
        let db = sled_config.open()?;
        let meta_tree = db.open_tree(META_TREE)?;
        let unique_index = UniqueIndex::open(&db)?;

        Ok(Self {
            db,
            meta_tree,
            unique_index,
        })
    }

    /// Check if the database was recovered from a previous run.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Allocate the next row id of an entity type (starting at 1).
    pub fn next_id(&self, entity_type: &str) -> Result<u64, Error> {
        let next = self
            .meta_tree
            .update_and_fetch(sequence_key(entity_type), |current| {
                let last = current.and_then(decode_id).unwrap_or(0);
                Some(encode_id(last + 1).to_vec())
            })?
            .ok_or(Error::InvalidKey)?;
        decode_id(&next).ok_or(Error::InvalidKey)
    }

    /// Write a row, replacing any previous version.
    pub fn put(&self, entity_type: &str, id: u64, record: &Record) -> Result<(), Error> {
        let value_bytes = record.to_bytes()?;
        self.rows(entity_type)?.insert(encode_id(id), value_bytes)?;
        debug!(entity = %entity_type, id, "Wrote row");
        Ok(())
    }

    /// Read a row.
    pub fn get(&self, entity_type: &str, id: u64) -> Result<Option<Record>, Error> {
        match self.rows(entity_type)?.get(encode_id(id))? {
            Some(bytes) => Ok(Some(Record::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Check whether a row exists.
    pub fn contains(&self, entity_type: &str, id: u64) -> Result<bool, Error> {
        Ok(self.rows(entity_type)?.contains_key(encode_id(id))?)
    }

    /// Remove a row, returning it if it existed.
    pub fn remove(&self, entity_type: &str, id: u64) -> Result<Option<Record>, Error> {
        match self.rows(entity_type)?.remove(encode_id(id))? {
            Some(bytes) => {
                debug!(entity = %entity_type, id, "Removed row");
                Ok(Some(Record::from_bytes(&bytes)?))
            }
            None => Ok(None),
        }
    }

    /// Scan all rows of an entity type in id order.
    pub fn scan(
        &self,
        entity_type: &str,
    ) -> Result<impl DoubleEndedIterator<Item = Result<(u64, Record), Error>>, Error> {
        Ok(self.rows(entity_type)?.iter().map(|result| {
            let (key, value) = result?;
            let id = decode_id(&key).ok_or(Error::InvalidKey)?;
            Ok((id, Record::from_bytes(&value)?))
        }))
    }

    /// Row with the lowest id.
    pub fn first(&self, entity_type: &str) -> Result<Option<(u64, Record)>, Error> {
        self.rows(entity_type)?
            .first()?
            .map(|(key, value)| decode_row(&key, &value))
            .transpose()
    }

    /// Row with the highest id.
    pub fn last(&self, entity_type: &str) -> Result<Option<(u64, Record)>, Error> {
        self.rows(entity_type)?
            .last()?
            .map(|(key, value)| decode_row(&key, &value))
            .transpose()
    }

    /// Number of rows of an entity type.
    pub fn count(&self, entity_type: &str) -> Result<usize, Error> {
        Ok(self.rows(entity_type)?.len())
    }

    /// Unique index shared by all entity types.
    pub fn unique_index(&self) -> &UniqueIndex {
        &self.unique_index
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    fn rows(&self, entity_type: &str) -> Result<Tree, Error> {
        Ok(self.db.open_tree(rows_tree_name(entity_type))?)
    }
}

fn decode_row(key: &[u8], value: &[u8]) -> Result<(u64, Record), Error> {
    let id = decode_id(key).ok_or(Error::InvalidKey)?;
    Ok((id, Record::from_bytes(value)?))
}
