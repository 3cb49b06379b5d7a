//! Attribute values stored on entities.

use std::cmp::Ordering;
use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer. Reference columns hold ids as `Int`.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, or a string made only of whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
        }
    }

    /// Borrow the string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a row id (non-negative integer).
    pub fn as_id(&self) -> Option<u64> {
        match self {
            Value::Int(i) if *i >= 0 => Some(*i as u64),
            _ => None,
        }
    }

    /// Compare two values, coercing between integers and floats.
    ///
    /// Returns `None` for values of unrelated types and for null against non-null.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// Equality with numeric coercion.
    pub fn loose_eq(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Canonical byte form used as a unique index key component.
    ///
    /// Integral floats encode like the equal integer, so `Int(3)` and
    /// `Float(3.0)` share a key.
    pub(crate) fn index_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Value::Float(f) if is_integral(*f) => {
                out.push(2);
                out.extend_from_slice(&(*f as i64).to_be_bytes());
            }
            Value::Null => out.push(0),
            Value::Bool(b) => {
                out.push(1);
                out.push(*b as u8);
            }
            Value::Int(i) => {
                out.push(2);
                out.extend_from_slice(&i.to_be_bytes());
            }
            Value::Float(f) => {
                out.push(3);
                out.extend_from_slice(&f.to_bits().to_be_bytes());
            }
            Value::String(s) => {
                out.push(4);
                out.extend_from_slice(s.as_bytes());
            }
            Value::Timestamp(t) => {
                out.push(5);
                out.extend_from_slice(&t.to_be_bytes());
            }
        }
        out
    }
}

fn is_integral(f: f64) -> bool {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Timestamp(t) => write!(f, "@{}", t),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u64> for Value {
    fn from(id: u64) -> Self {
        Value::Int(id as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values() {
        assert!(Value::Null.is_blank());
        assert!(Value::from("").is_blank());
        assert!(Value::from("   ").is_blank());
        assert!(!Value::from("House").is_blank());
        assert!(!Value::Int(0).is_blank());
        assert!(!Value::Bool(false).is_blank());
    }

    #[test]
    fn test_numeric_coercion() {
        assert!(Value::Int(3).loose_eq(&Value::Float(3.0)));
        assert_eq!(
            Value::Int(2).compare(&Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Int(1).compare(&Value::from("1")), None);
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
    }

    #[test]
    fn test_as_id() {
        assert_eq!(Value::Int(7).as_id(), Some(7));
        assert_eq!(Value::Int(-1).as_id(), None);
        assert_eq!(Value::from("7").as_id(), None);
        assert_eq!(Value::from(7u64), Value::Int(7));
    }

    #[test]
    fn test_index_bytes_distinguish_types() {
        assert_ne!(Value::Int(1).index_bytes(), Value::from("1").index_bytes());
        assert_ne!(Value::Int(3).index_bytes(), Value::Float(3.5).index_bytes());
        assert_eq!(
            Value::from("House").index_bytes(),
            Value::from("House").index_bytes()
        );
    }

    #[test]
    fn test_index_bytes_unify_integral_floats() {
        assert_eq!(Value::Int(3).index_bytes(), Value::Float(3.0).index_bytes());
        assert_eq!(Value::Int(0).index_bytes(), Value::Float(-0.0).index_bytes());
        assert_eq!(Value::Int(-7).index_bytes(), Value::Float(-7.0).index_bytes());
        assert_ne!(
            Value::Float(f64::INFINITY).index_bytes(),
            Value::Int(i64::MAX).index_bytes()
        );
    }
}
