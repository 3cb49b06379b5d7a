//! Validation engine.
//!
//! Rules are declared per entity type and attribute:
//! - Presence (non-null, non-blank)
//! - Uniqueness (optionally scoped to a second attribute)
//! - Minimum length
//! - Regular-expression format
//!
//! All rules are evaluated; every failure is recorded in the violation
//! mapping and blocks the standard save path.

mod rule;
mod validator;
mod violations;

pub use rule::{RuleKind, ValidationRule};
pub use validator::Validator;
pub use violations::Violations;
