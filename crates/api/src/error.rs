use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use fhir::{FhirError, Outcome};

/// Everything a handler can fail with. Rendered by [`IntoResponse`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-ok repository outcome, bad stored data, or a malformed reference.
    #[error(transparent)]
    Fhir(#[from] FhirError),

    /// Missing or unknown bearer token.
    #[error("unauthorized")]
    Unauthorized,

    /// Request body that is not a JSON document.
    #[error(transparent)]
    Body(#[from] JsonRejection),

    /// Caller is not an admin of the project (or it does not exist).
    #[error("not found")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Fhir(FhirError::Outcome(outcome)) => {
                error!("repository outcome {} ({})", outcome.id(), outcome.status());
                let status = StatusCode::from_u16(outcome.status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, Json(outcome)).into_response()
            }
            ApiError::Fhir(other) => {
                error!("request failed: {other}");
                let outcome = Outcome::ServerError(other.to_string());
                (StatusCode::INTERNAL_SERVER_ERROR, Json(outcome)).into_response()
            }
            ApiError::Body(rejection) => {
                warn!("rejected request body: {rejection}");
                let outcome = Outcome::BadRequest(rejection.body_text());
                (rejection.status(), Json(outcome)).into_response()
            }
            ApiError::Unauthorized => {
                let body = json!({
                    "resourceType": "OperationOutcome",
                    "id": "unauthorized",
                    "issue": [{
                        "severity": "error",
                        "code": "login",
                        "details": { "text": "Unauthorized" }
                    }]
                });
                (StatusCode::UNAUTHORIZED, Json(body)).into_response()
            }
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
        }
    }
}
