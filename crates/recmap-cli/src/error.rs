//! CLI errors.

use thiserror::Error;

/// Errors surfaced by the command-line client.
#[derive(Debug, Error)]
pub enum CliError {
    /// Record mapper error.
    #[error("{0}")]
    Core(#[from] recmap_core::Error),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid validation pattern in the built-in schema.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Malformed `--order` argument.
    #[error("invalid order '{0}', expected <attribute>[:asc|:desc]")]
    InvalidOrder(String),
}
