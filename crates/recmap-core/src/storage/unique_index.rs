//! Secondary index for enforcing uniqueness at write time.
//!
//! The UniqueIndex maintains a separate sled tree that maps unique attribute
//! values to row ids, so duplicates are caught even when validation is
//! bypassed or two writers race.

use sled::Tree;

use super::key::{decode_id, encode_id};
use crate::error::{ConstraintError, Error};
use crate::value::Value;

/// Tree name for the unique index.
pub const UNIQUE_INDEX_TREE: &str = "index:unique";

/// Secondary index for uniqueness rules.
///
/// Key format: `entity\0column\0` followed by each value as a
/// length-prefixed canonical byte string; value: row id.
pub struct UniqueIndex {
    tree: Tree,
}

impl UniqueIndex {
    /// Open or create the unique index from a sled database.
    pub fn open(db: &sled::Db) -> Result<Self, Error> {
        let tree = db.open_tree(UNIQUE_INDEX_TREE)?;
        Ok(Self { tree })
    }

    fn prefix(entity: &str, column: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(entity.len() + column.len() + 2);
        key.extend_from_slice(entity.as_bytes());
        key.push(0);
        key.extend_from_slice(column.as_bytes());
        key.push(0);
        key
    }

    /// Build the index key for a set of values.
    fn build_key(entity: &str, column: &str, values: &[&Value]) -> Vec<u8> {
        let mut key = Self::prefix(entity, column);
        for value in values {
            let bytes = value.index_bytes();
            key.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            key.extend_from_slice(&bytes);
        }
        key
    }

    /// Claim the values for `id`.
    ///
    /// Returns a unique violation if a different row already holds them.
    pub fn insert(
        &self,
        entity: &str,
        column: &str,
        values: &[&Value],
        id: u64,
    ) -> Result<(), Error> {
        let key = Self::build_key(entity, column, values);
        let id_bytes = encode_id(id);

        match self
            .tree
            .compare_and_swap(&key, None as Option<&[u8]>, Some(&id_bytes[..]))?
        {
            Ok(()) => Ok(()),
            // Same row claiming its own value again (update case)
            Err(cas) if cas.current.as_deref() == Some(&id_bytes[..]) => Ok(()),
            Err(_) => Err(ConstraintError::Unique {
                entity: entity.to_string(),
                column: column.to_string(),
                value: values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            }
            .into()),
        }
    }

    /// Release the values if they are held by `id`.
    pub fn remove(&self, entity: &str, column: &str, values: &[&Value], id: u64) -> Result<(), Error> {
        let key = Self::build_key(entity, column, values);
        // Compare-and-swap so a row never releases a value another row holds.
        let _ = self
            .tree
            .compare_and_swap(&key, Some(&encode_id(id)[..]), None as Option<&[u8]>)?;
        Ok(())
    }

    /// Look up the row id holding the values.
    pub fn lookup(&self, entity: &str, column: &str, values: &[&Value]) -> Result<Option<u64>, Error> {
        let key = Self::build_key(entity, column, values);
        match self.tree.get(&key)? {
            Some(bytes) => decode_id(&bytes).map(Some).ok_or(Error::InvalidKey),
            None => Ok(None),
        }
    }

    /// Get the number of entries in the index.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_index() -> UniqueIndex {
        let db = sled::Config::new().temporary(true).open().unwrap();
        UniqueIndex::open(&db).unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let index = test_index();
        let house = Value::from("House");

        index.insert("Doctor", "last_name", &[&house], 1).unwrap();

        assert_eq!(index.lookup("Doctor", "last_name", &[&house]).unwrap(), Some(1));
        assert_eq!(
            index
                .lookup("Doctor", "last_name", &[&Value::from("Wilson")])
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_duplicate_value() {
        let index = test_index();
        let house = Value::from("House");

        index.insert("Doctor", "last_name", &[&house], 1).unwrap();
        // Re-claiming by the same row is fine
        index.insert("Doctor", "last_name", &[&house], 1).unwrap();

        let result = index.insert("Doctor", "last_name", &[&house], 2);
        assert!(matches!(
            result,
            Err(Error::ConstraintViolation(ConstraintError::Unique { .. }))
        ));
    }

    #[test]
    fn test_scoped_values() {
        let index = test_index();
        let gregory = Value::from("Gregory");

        index
            .insert("Doctor", "first_name", &[&gregory, &Value::from("House")], 1)
            .unwrap();
        index
            .insert("Doctor", "first_name", &[&gregory, &Value::from("Lestrade")], 2)
            .unwrap();

        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_remove_only_own_entry() {
        let index = test_index();
        let house = Value::from("House");

        index.insert("Doctor", "last_name", &[&house], 1).unwrap();
        index.remove("Doctor", "last_name", &[&house], 2).unwrap();
        assert_eq!(index.lookup("Doctor", "last_name", &[&house]).unwrap(), Some(1));

        index.remove("Doctor", "last_name", &[&house], 1).unwrap();
        assert!(index.is_empty());
    }
}
