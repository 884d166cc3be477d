//! The status value returned alongside every repository operation.
//!
//! Callers must inspect it (usually through [`assert_ok`]) before trusting
//! the resource that came with it. [`Outcome::status`] is the HTTP status a
//! handler should answer with when it forwards the result.

use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::FhirError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Created,
    NotModified,
    NotFound,
    Gone,
    Forbidden,
    BadRequest(String),
    ServerError(String),
}

impl Outcome {
    /// `ok`, `created` and `not-modified` all carry a usable resource.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok | Self::Created | Self::NotModified)
    }

    /// Suggested HTTP status code.
    pub fn status(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::NotModified => 304,
            Self::BadRequest(_) => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Gone => 410,
            Self::ServerError(_) => 500,
        }
    }

    /// Identifier used as the `OperationOutcome.id`.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Created => "created",
            Self::NotModified => "not-modified",
            Self::NotFound => "not-found",
            Self::Gone => "gone",
            Self::Forbidden => "forbidden",
            Self::BadRequest(_) => "bad-request",
            Self::ServerError(_) => "server-error",
        }
    }

    fn issue(&self) -> (&'static str, &'static str, String) {
        match self {
            Self::Ok => ("information", "informational", "All OK".into()),
            Self::Created => ("information", "informational", "Created".into()),
            Self::NotModified => ("information", "informational", "Not Modified".into()),
            Self::NotFound => ("error", "not-found", "Not found".into()),
            Self::Gone => ("error", "deleted", "Deleted".into()),
            Self::Forbidden => ("error", "forbidden", "Forbidden".into()),
            Self::BadRequest(msg) => ("error", "invalid", msg.clone()),
            Self::ServerError(msg) => ("error", "exception", msg.clone()),
        }
    }

    /// Render as a FHIR `OperationOutcome` resource.
    pub fn to_operation_outcome(&self) -> Value {
        let (severity, code, text) = self.issue();
        json!({
            "resourceType": "OperationOutcome",
            "id": self.id(),
            "issue": [{
                "severity": severity,
                "code": code,
                "details": { "text": text }
            }]
        })
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_operation_outcome().serialize(serializer)
    }
}

/// Fail with [`FhirError::Outcome`] unless the outcome is ok.
pub fn assert_ok(outcome: &Outcome) -> Result<(), FhirError> {
    if outcome.is_ok() {
        Ok(())
    } else {
        Err(FhirError::Outcome(outcome.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_family_passes_assert_ok() {
        for o in [Outcome::Ok, Outcome::Created, Outcome::NotModified] {
            assert!(assert_ok(&o).is_ok());
        }
    }

    #[test]
    fn failures_are_raised_with_their_outcome() {
        let err = assert_ok(&Outcome::NotFound).unwrap_err();
        assert!(matches!(err, FhirError::Outcome(Outcome::NotFound)));
        assert!(assert_ok(&Outcome::BadRequest("nope".into())).is_err());
    }

    #[test]
    fn status_codes() {
        assert_eq!(Outcome::Ok.status(), 200);
        assert_eq!(Outcome::Created.status(), 201);
        assert_eq!(Outcome::NotModified.status(), 304);
        assert_eq!(Outcome::NotFound.status(), 404);
        assert_eq!(Outcome::ServerError("x".into()).status(), 500);
    }

    #[test]
    fn serialises_as_operation_outcome() {
        let v = serde_json::to_value(Outcome::BadRequest("Missing id".into())).unwrap();
        assert_eq!(v["resourceType"], "OperationOutcome");
        assert_eq!(v["id"], "bad-request");
        assert_eq!(v["issue"][0]["code"], "invalid");
        assert_eq!(v["issue"][0]["details"]["text"], "Missing id");
    }
}
