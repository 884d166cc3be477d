//! In-memory repository. All data is held in RAM.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use fhir::{Bundle, Outcome, SearchRequest};

use super::{resource_key, same_content, stamp, Repository, RepositoryResult};

/// Resources grouped by type, each group in insertion order.
#[derive(Debug, Default)]
struct Inner {
    by_type: HashMap<String, Vec<Value>>,
}

impl Inner {
    fn position(&self, resource_type: &str, id: &str) -> Option<usize> {
        self.by_type.get(resource_type)?.iter().position(|r| {
            r.get("id").and_then(Value::as_str) == Some(id)
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored resources of `resource_type`.
    pub async fn count(&self, resource_type: &str) -> usize {
        self.inner
            .read()
            .await
            .by_type
            .get(resource_type)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    #[instrument(skip(self, resource))]
    async fn create_resource(&self, mut resource: Value) -> RepositoryResult<Value> {
        let (resource_type, id) = match resource_key(&resource, false) {
            Ok(key) => key,
            Err(outcome) => return (outcome, None),
        };
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut inner = self.inner.write().await;
        if inner.position(&resource_type, &id).is_some() {
            return (
                Outcome::BadRequest(format!("{resource_type}/{id} already exists")),
                None,
            );
        }
        stamp(&mut resource, &id);
        debug!(%resource_type, %id, "created resource");
        inner
            .by_type
            .entry(resource_type)
            .or_default()
            .push(resource.clone());
        (Outcome::Created, Some(resource))
    }

    #[instrument(skip(self))]
    async fn read_resource(&self, resource_type: &str, id: &str) -> RepositoryResult<Value> {
        let inner = self.inner.read().await;
        match inner.position(resource_type, id) {
            Some(idx) => (Outcome::Ok, Some(inner.by_type[resource_type][idx].clone())),
            None => (Outcome::NotFound, None),
        }
    }

    #[instrument(skip(self, resource))]
    async fn update_resource(&self, mut resource: Value) -> RepositoryResult<Value> {
        let (resource_type, id) = match resource_key(&resource, true) {
            Ok((ty, Some(id))) => (ty, id),
            Ok((_, None)) => return (Outcome::BadRequest("Missing id".into()), None),
            Err(outcome) => return (outcome, None),
        };

        let mut inner = self.inner.write().await;
        match inner.position(&resource_type, &id) {
            None => {
                stamp(&mut resource, &id);
                debug!(%resource_type, %id, "update created resource");
                inner
                    .by_type
                    .entry(resource_type)
                    .or_default()
                    .push(resource.clone());
                (Outcome::Created, Some(resource))
            }
            Some(idx) => {
                let slot = match inner.by_type.get_mut(&resource_type) {
                    Some(group) => &mut group[idx],
                    None => return (Outcome::NotFound, None),
                };
                if same_content(slot, &resource) {
                    return (Outcome::NotModified, Some(slot.clone()));
                }
                stamp(&mut resource, &id);
                debug!(%resource_type, %id, "updated resource");
                *slot = resource.clone();
                (Outcome::Ok, Some(resource))
            }
        }
    }

    #[instrument(skip(self), fields(resource_type = %request.resource_type))]
    async fn search(&self, request: &SearchRequest) -> RepositoryResult<Bundle> {
        let inner = self.inner.read().await;
        let found = inner
            .by_type
            .get(&request.resource_type)
            .map(|group| {
                group
                    .iter()
                    .filter(|r| request.matches(r))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        debug!(matches = found.len(), "search complete");
        (Outcome::Ok, Some(Bundle::searchset(found)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir::{Operator, Reference};
    use serde_json::json;

    fn project(id: &str, name: &str) -> Value {
        json!({ "resourceType": "Project", "id": id, "name": name })
    }

    #[tokio::test]
    async fn create_assigns_id_and_meta() {
        let repo = MemoryRepository::new();
        let (outcome, created) = repo
            .create_resource(json!({ "resourceType": "Project", "name": "Acme" }))
            .await;
        assert_eq!(outcome, Outcome::Created);
        let created = created.unwrap();
        assert!(created["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(created["meta"]["versionId"].is_string());
    }

    #[tokio::test]
    async fn create_rejects_duplicate_ids() {
        let repo = MemoryRepository::new();
        repo.create_resource(project("p1", "Acme")).await;
        let (outcome, _) = repo.create_resource(project("p1", "Again")).await;
        assert!(matches!(outcome, Outcome::BadRequest(_)));
    }

    #[tokio::test]
    async fn read_missing_resource_is_not_found() {
        let repo = MemoryRepository::new();
        let (outcome, resource) = repo.read_resource("Project", "nope").await;
        assert_eq!(outcome, Outcome::NotFound);
        assert!(resource.is_none());
    }

    #[tokio::test]
    async fn read_reference_resolves_type_and_id() {
        let repo = MemoryRepository::new();
        repo.create_resource(project("p1", "Acme")).await;

        let (outcome, resource) = repo.read_reference(&Reference::new("Project", "p1")).await;
        assert_eq!(outcome, Outcome::Ok);
        assert_eq!(resource.unwrap()["name"], "Acme");

        let bad = Reference { reference: Some("garbage".into()), display: None };
        let (outcome, _) = repo.read_reference(&bad).await;
        assert!(matches!(outcome, Outcome::BadRequest(_)));
    }

    #[tokio::test]
    async fn update_outcomes() {
        let repo = MemoryRepository::new();

        let (outcome, _) = repo.update_resource(project("p1", "Acme")).await;
        assert_eq!(outcome, Outcome::Created);

        let (outcome, stored) = repo.update_resource(project("p1", "Acme")).await;
        assert_eq!(outcome, Outcome::NotModified);
        assert_eq!(stored.unwrap()["name"], "Acme");

        let (outcome, updated) = repo.update_resource(project("p1", "Acme Health")).await;
        assert_eq!(outcome, Outcome::Ok);
        assert_eq!(updated.unwrap()["name"], "Acme Health");

        let (_, read) = repo.read_resource("Project", "p1").await;
        assert_eq!(read.unwrap()["name"], "Acme Health");
        assert_eq!(repo.count("Project").await, 1);
    }

    #[tokio::test]
    async fn update_without_id_is_bad_request() {
        let repo = MemoryRepository::new();
        let (outcome, _) = repo
            .update_resource(json!({ "resourceType": "Project", "name": "x" }))
            .await;
        assert_eq!(outcome, Outcome::BadRequest("Missing id".into()));
    }

    #[tokio::test]
    async fn search_preserves_insertion_order() {
        let repo = MemoryRepository::new();
        for (id, user) in [("m2", "User/u1"), ("m1", "User/u2"), ("m3", "User/u1")] {
            repo.create_resource(json!({
                "resourceType": "ProjectMembership",
                "id": id,
                "user": { "reference": user }
            }))
            .await;
        }

        let req = SearchRequest::new("ProjectMembership").filter("user", Operator::Equals, "User/u1");
        let (outcome, bundle) = repo.search(&req).await;
        assert_eq!(outcome, Outcome::Ok);
        let ids: Vec<_> = bundle
            .unwrap()
            .entry
            .into_iter()
            .map(|e| e.resource["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["m2", "m3"]);
    }

    #[tokio::test]
    async fn search_of_unknown_type_is_empty() {
        let repo = MemoryRepository::new();
        let (outcome, bundle) = repo.search(&SearchRequest::new("ValueSet")).await;
        assert_eq!(outcome, Outcome::Ok);
        assert!(bundle.unwrap().entry.is_empty());
    }
}
