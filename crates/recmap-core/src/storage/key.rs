//! Row key encoding.

/// Size of an encoded row id.
pub const ID_SIZE: usize = 8;

/// Encode a row id.
///
/// Big-endian encoding keeps lexicographic key order equal to numeric id
/// order, so tree scans return rows oldest id first.
pub fn encode_id(id: u64) -> [u8; ID_SIZE] {
    id.to_be_bytes()
}

/// Decode a row id.
pub fn decode_id(bytes: &[u8]) -> Option<u64> {
    let buf: [u8; ID_SIZE] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(buf))
}

/// Tree name holding the rows of one entity type.
pub fn rows_tree_name(entity_type: &str) -> String {
    format!("rows:{}", entity_type)
}

/// Meta key holding the id sequence of one entity type.
pub fn sequence_key(entity_type: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + entity_type.len());
    key.extend_from_slice(b"seq:");
    key.extend_from_slice(entity_type.as_bytes());
    key
}

/// Get current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip() {
        assert_eq!(decode_id(&encode_id(42)), Some(42));
    }

    #[test]
    fn test_lexicographic_ordering() {
        // Lexicographic ordering should match numeric ordering
        assert!(encode_id(9) < encode_id(10));
        assert!(encode_id(255) < encode_id(256));
    }

    #[test]
    fn test_decode_invalid_length() {
        assert!(decode_id(&[0u8; 4]).is_none());
        assert!(decode_id(&[0u8; 12]).is_none());
    }

    #[test]
    fn test_names() {
        assert_eq!(rows_tree_name("Doctor"), "rows:Doctor");
        assert_eq!(sequence_key("Doctor"), b"seq:Doctor".to_vec());
    }
}
