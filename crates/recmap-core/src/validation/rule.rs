//! Validation rule declarations.

use regex::Regex;

/// Kinds of validation rule.
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// The value must be non-null and, for strings, non-blank.
    Presence,
    /// No other persisted row may hold the same value.
    Uniqueness {
        /// Second attribute whose value must also match for a conflict.
        scope: Option<String>,
    },
    /// The string form must have at least `minimum` characters.
    Length {
        /// Minimum character count.
        minimum: usize,
    },
    /// The value must be a string matching the pattern.
    Format {
        /// Pattern the whole value is tested against.
        pattern: Regex,
    },
}

/// A validation rule attached to one attribute.
#[derive(Debug, Clone)]
pub struct ValidationRule {
    /// Attribute under validation.
    pub attribute: String,
    /// Rule kind.
    pub kind: RuleKind,
    /// Message overriding the default one.
    pub message: Option<String>,
}

impl ValidationRule {
    fn new(attribute: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            attribute: attribute.into(),
            kind,
            message: None,
        }
    }

    /// Require a non-blank value.
    pub fn presence(attribute: impl Into<String>) -> Self {
        Self::new(attribute, RuleKind::Presence)
    }

    /// Require a value no other row holds.
    pub fn uniqueness(attribute: impl Into<String>) -> Self {
        Self::new(attribute, RuleKind::Uniqueness { scope: None })
    }

    /// Require a value no other row holds together with the same `scope` value.
    pub fn uniqueness_scoped(attribute: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::new(
            attribute,
            RuleKind::Uniqueness {
                scope: Some(scope.into()),
            },
        )
    }

    /// Require at least `minimum` characters.
    pub fn min_length(attribute: impl Into<String>, minimum: usize) -> Self {
        Self::new(attribute, RuleKind::Length { minimum })
    }

    /// Require a string matching `pattern`.
    pub fn format(attribute: impl Into<String>, pattern: Regex) -> Self {
        Self::new(attribute, RuleKind::Format { pattern })
    }

    /// Replace the default message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Check if this rule needs the unique index.
    pub fn is_uniqueness(&self) -> bool {
        matches!(self.kind, RuleKind::Uniqueness { .. })
    }

    /// Scope attribute of a uniqueness rule.
    pub fn scope(&self) -> Option<&str> {
        match &self.kind {
            RuleKind::Uniqueness { scope } => scope.as_deref(),
            _ => None,
        }
    }

    /// Attributes the rule reads.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.attribute.as_str()).chain(self.scope())
    }

    /// Check whether the rule reads `column`.
    pub fn mentions(&self, column: &str) -> bool {
        self.columns().any(|c| c == column)
    }

    /// Message recorded when the rule fails.
    pub fn failure_message(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        match &self.kind {
            RuleKind::Presence => "required".to_string(),
            RuleKind::Uniqueness { .. } => "has already been taken".to_string(),
            RuleKind::Length { minimum } => {
                format!("is too short (minimum is {} characters)", minimum)
            }
            RuleKind::Format { .. } => "is invalid".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_messages() {
        assert_eq!(ValidationRule::presence("last_name").failure_message(), "required");
        assert_eq!(
            ValidationRule::uniqueness("last_name").failure_message(),
            "has already been taken"
        );
        assert_eq!(
            ValidationRule::min_length("last_name", 3).failure_message(),
            "is too short (minimum is 3 characters)"
        );
        let email = ValidationRule::format("email", Regex::new(r"\A.*@.*\.com\z").unwrap());
        assert_eq!(email.failure_message(), "is invalid");
    }

    #[test]
    fn test_custom_message() {
        let rule = ValidationRule::presence("last_name").with_message("can't be blank");
        assert_eq!(rule.failure_message(), "can't be blank");
    }

    #[test]
    fn test_scoped_columns() {
        let rule = ValidationRule::uniqueness_scoped("first_name", "last_name");

        assert!(rule.is_uniqueness());
        assert_eq!(rule.scope(), Some("last_name"));
        assert_eq!(rule.columns().collect::<Vec<_>>(), vec!["first_name", "last_name"]);
        assert!(rule.mentions("last_name"));
        assert!(!ValidationRule::presence("first_name").mentions("last_name"));
    }
}
