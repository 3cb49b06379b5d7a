//! Record type for stored rows.

use crate::error::Error;
use crate::value::Value;
use rkyv::{Archive, Deserialize, Serialize};

/// One stored attribute.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct StoredAttribute {
    /// Column name.
    pub name: String,
    /// Column value.
    pub value: Value,
}

/// A stored row with its timestamps.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Record {
    /// Attribute values in column order.
    pub attributes: Vec<StoredAttribute>,

    /// Creation timestamp in microseconds since Unix epoch.
    pub created_at: u64,

    /// Last update timestamp in microseconds since Unix epoch.
    pub updated_at: u64,
}

impl Record {
    /// Create a record from name/value pairs.
    pub fn new(
        attributes: impl IntoIterator<Item = (String, Value)>,
        created_at: u64,
        updated_at: u64,
    ) -> Self {
        Self {
            attributes: attributes
                .into_iter()
                .map(|(name, value)| StoredAttribute { name, value })
                .collect(),
            created_at,
            updated_at,
        }
    }

    /// Look up one attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrip() {
        let record = Record::new(
            vec![
                ("name".to_string(), Value::from("The fox")),
                ("rating".to_string(), Value::Int(3)),
                ("address".to_string(), Value::Null),
            ],
            100,
            200,
        );
        let bytes = record.to_bytes().unwrap();
        let decoded = Record::from_bytes(&bytes).unwrap();

        assert_eq!(record, decoded);
        assert_eq!(decoded.get("rating"), Some(&Value::Int(3)));
        assert_eq!(decoded.get("missing"), None);
    }

    #[test]
    fn test_garbage_bytes() {
        assert!(matches!(
            Record::from_bytes(&[1, 2, 3]),
            Err(Error::Deserialization(_))
        ));
    }
}
