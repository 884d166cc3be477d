//! The repository contract and its implementations.
//!
//! Every operation answers with an `(Outcome, Option<T>)` pair. The outcome
//! is the authoritative status; the resource is only meaningful when
//! `outcome.is_ok()`.

pub mod memory;
pub mod postgres;
pub mod recording;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use fhir::{Bundle, Outcome, Reference, SearchRequest};

pub use memory::MemoryRepository;
pub use postgres::PgRepository;
pub use recording::{RecordedCall, RecordingRepository};

/// Outcome plus (maybe) a value.
pub type RepositoryResult<T> = (Outcome, Option<T>);

/// Search / read / update access to stored resources.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Store a new resource. An `id` is assigned when the resource has none.
    async fn create_resource(&self, resource: Value) -> RepositoryResult<Value>;

    /// Read one resource by type and id.
    async fn read_resource(&self, resource_type: &str, id: &str) -> RepositoryResult<Value>;

    /// Resolve a `Type/id` reference.
    async fn read_reference(&self, reference: &Reference) -> RepositoryResult<Value> {
        match reference.parse() {
            Ok((resource_type, id)) => self.read_resource(resource_type, id).await,
            Err(e) => (Outcome::BadRequest(e.to_string()), None),
        }
    }

    /// Replace a stored resource with `resource`.
    ///
    /// `Created` when nothing was stored under that id, `NotModified` when
    /// the content is unchanged (the stored copy is returned), `Ok` otherwise.
    async fn update_resource(&self, resource: Value) -> RepositoryResult<Value>;

    /// All resources of the requested type matching every filter, in the
    /// order they were first stored.
    async fn search(&self, request: &SearchRequest) -> RepositoryResult<Bundle>;
}

// ---------------------------------------------------------------------------
// Helpers shared by the implementations
// ---------------------------------------------------------------------------

/// `(resourceType, id)` of a resource about to be written.
pub(crate) fn resource_key(resource: &Value, require_id: bool) -> Result<(String, Option<String>), Outcome> {
    if !resource.is_object() {
        return Err(Outcome::BadRequest("Resource must be a JSON object".into()));
    }
    let resource_type = resource
        .get("resourceType")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Outcome::BadRequest("Missing resourceType".into()))?;
    let id = resource.get("id").and_then(Value::as_str).filter(|s| !s.is_empty());
    if require_id && id.is_none() {
        return Err(Outcome::BadRequest("Missing id".into()));
    }
    Ok((resource_type.to_string(), id.map(str::to_string)))
}

/// Assign `id` (if absent) and a fresh `meta.versionId` / `meta.lastUpdated`.
///
/// Returns the new version id and timestamp.
pub(crate) fn stamp(resource: &mut Value, id: &str) -> (String, DateTime<Utc>) {
    let version_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    if let Some(obj) = resource.as_object_mut() {
        obj.insert("id".into(), Value::String(id.to_string()));
        let meta = obj
            .entry("meta")
            .or_insert_with(|| Value::Object(Default::default()));
        if !meta.is_object() {
            *meta = Value::Object(Default::default());
        }
        if let Some(meta) = meta.as_object_mut() {
            meta.insert("versionId".into(), Value::String(version_id.clone()));
            meta.insert(
                "lastUpdated".into(),
                Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
    }
    (version_id, now)
}

/// Equality ignoring `meta`.
pub(crate) fn same_content(a: &Value, b: &Value) -> bool {
    match (a.as_object(), b.as_object()) {
        (Some(a), Some(b)) => {
            let strip = |o: &serde_json::Map<String, Value>| {
                o.iter()
                    .filter(|(k, _)| k.as_str() != "meta")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<serde_json::Map<_, _>>()
            };
            strip(a) == strip(b)
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_key_requires_type() {
        assert!(resource_key(&json!({ "id": "x" }), false).is_err());
        assert!(resource_key(&json!("nope"), false).is_err());
    }

    #[test]
    fn resource_key_optionally_requires_id() {
        let r = json!({ "resourceType": "Project" });
        assert_eq!(resource_key(&r, false).unwrap(), ("Project".into(), None));
        assert_eq!(
            resource_key(&r, true).unwrap_err(),
            Outcome::BadRequest("Missing id".into())
        );
    }

    #[test]
    fn stamp_sets_id_and_meta() {
        let mut r = json!({ "resourceType": "Project", "meta": "garbage" });
        let (version, _) = stamp(&mut r, "p1");
        assert_eq!(r["id"], "p1");
        assert_eq!(r["meta"]["versionId"], json!(version));
        assert!(r["meta"]["lastUpdated"].is_string());
    }

    #[test]
    fn same_content_ignores_meta() {
        let a = json!({ "id": "p1", "name": "Acme", "meta": { "versionId": "1" } });
        let b = json!({ "id": "p1", "name": "Acme" });
        let c = json!({ "id": "p1", "name": "Other" });
        assert!(same_content(&a, &b));
        assert!(!same_content(&a, &c));
    }
}
