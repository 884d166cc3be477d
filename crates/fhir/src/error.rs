//! Error type shared by everything that handles resources.

use thiserror::Error;

use crate::Outcome;

#[derive(Debug, Error)]
pub enum FhirError {
    /// A repository call came back with a non-ok outcome.
    #[error("operation failed: {}", .0.id())]
    Outcome(Outcome),

    /// A reference string was not of the form `Type/id`.
    #[error("invalid reference: '{0}'")]
    InvalidReference(String),

    /// JSON carried a different `resourceType` than the one asked for.
    #[error("expected resourceType '{expected}', found '{found}'")]
    WrongResourceType {
        expected: &'static str,
        found: String,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
