//! Violation mapping produced by a validation run.

use std::collections::BTreeMap;
use std::fmt;

/// Attribute name → violation messages. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct Violations(BTreeMap<String, Vec<String>>);

impl Violations {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against an attribute.
    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.0
            .entry(attribute.into())
            .or_default()
            .push(message.into());
    }

    /// Check if no rule failed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of attributes with at least one violation.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Messages recorded against an attribute.
    pub fn get(&self, attribute: &str) -> Option<&[String]> {
        self.0.get(attribute).map(Vec::as_slice)
    }

    /// Iterate attribute/messages pairs in attribute order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Full messages, e.g. `last_name required`.
    pub fn full_messages(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|(attr, messages)| messages.iter().map(move |m| format!("{} {}", attr, m)))
            .collect()
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_messages().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_per_attribute() {
        let mut violations = Violations::new();
        assert!(violations.is_empty());

        violations.add("last_name", "required");
        violations.add("last_name", "is too short (minimum is 3 characters)");
        violations.add("email", "is invalid");

        assert_eq!(violations.len(), 2);
        assert_eq!(violations.get("last_name").map(|m| m.len()), Some(2));
        assert_eq!(violations.get("first_name"), None);
    }

    #[test]
    fn test_display() {
        let mut violations = Violations::new();
        violations.add("last_name", "required");
        violations.add("email", "is invalid");

        assert_eq!(violations.to_string(), "email is invalid, last_name required");
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut violations = Violations::new();
        violations.add("last_name", "required");

        let json = serde_json::to_value(&violations).unwrap();
        assert_eq!(json, serde_json::json!({ "last_name": ["required"] }));
    }
}
