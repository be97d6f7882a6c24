//! Error types for policy parsing and validation.

use thiserror::Error;

/// Errors that can occur while ingesting a policy document.
#[derive(Debug, Error)]
pub enum Error {
    /// The document is not valid JSON for the policy schema.
    #[error("malformed policy document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A policy failed structural validation.
    #[error("policy '{id}': {reason}")]
    Invalid {
        /// ID of the offending policy.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Two policies share the same ID.
    #[error("duplicate policy id '{0}'")]
    DuplicateId(String),

    /// I/O error reading a policy source.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Builds an [`Error::Invalid`] for the given policy.
    #[must_use]
    pub fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for policy operations.
pub type Result<T> = std::result::Result<T, Error>;
