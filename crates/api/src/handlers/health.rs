use axum::Json;
use serde_json::{json, Value};

/// GET /healthcheck: liveness check, no authentication.
pub async fn healthcheck() -> Json<Value> {
    Json(json!({ "ok": true }))
}
