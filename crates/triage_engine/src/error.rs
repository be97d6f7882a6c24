//! Error types for policy compilation and registry updates.

use thiserror::Error;

/// Errors that can occur while compiling or installing a policy set.
///
/// Evaluation itself is infallible; everything here is caught at ingest.
#[derive(Debug, Error)]
pub enum Error {
    /// The policy document failed to parse or validate.
    #[error(transparent)]
    Policy(#[from] triage_policy::Error),

    /// A matcher regex failed to compile.
    #[error("policy '{id}': invalid regex '{pattern}': {source}")]
    InvalidRegex {
        /// ID of the policy carrying the regex.
        id: String,
        /// The offending pattern.
        pattern: String,
        /// The regex crate's diagnosis.
        source: regex::Error,
    },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
