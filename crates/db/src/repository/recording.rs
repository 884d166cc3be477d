//! `RecordingRepository`: a test double that wraps another repository and
//! records every call it forwards.
//!
//! Useful where a test needs to assert that a code path issued (or did not
//! issue) a particular repository operation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use fhir::{Bundle, Reference, SearchRequest};

use super::{Repository, RepositoryResult};

/// One forwarded call.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Create(Value),
    Read { resource_type: String, id: String },
    ReadReference(Reference),
    Update(Value),
    Search(SearchRequest),
}

impl RecordedCall {
    /// Whether the call could have changed stored data.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Create(_) | Self::Update(_))
    }
}

pub struct RecordingRepository<R> {
    inner: R,
    /// All calls seen so far, in call order.
    pub calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl<R: Repository> RecordingRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls().iter().filter(|c| c.is_mutation()).count()
    }

    /// Forget everything recorded so far (e.g. after seeding fixtures).
    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn record(&self, call: RecordedCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl<R: Repository> Repository for RecordingRepository<R> {
    async fn create_resource(&self, resource: Value) -> RepositoryResult<Value> {
        self.record(RecordedCall::Create(resource.clone()));
        self.inner.create_resource(resource).await
    }

    async fn read_resource(&self, resource_type: &str, id: &str) -> RepositoryResult<Value> {
        self.record(RecordedCall::Read {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        });
        self.inner.read_resource(resource_type, id).await
    }

    async fn read_reference(&self, reference: &Reference) -> RepositoryResult<Value> {
        self.record(RecordedCall::ReadReference(reference.clone()));
        self.inner.read_reference(reference).await
    }

    async fn update_resource(&self, resource: Value) -> RepositoryResult<Value> {
        self.record(RecordedCall::Update(resource.clone()));
        self.inner.update_resource(resource).await
    }

    async fn search(&self, request: &SearchRequest) -> RepositoryResult<Bundle> {
        self.record(RecordedCall::Search(request.clone()));
        self.inner.search(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryRepository;
    use serde_json::json;

    #[tokio::test]
    async fn records_calls_in_order_and_flags_mutations() {
        let repo = RecordingRepository::new(MemoryRepository::new());
        repo.create_resource(json!({ "resourceType": "Project", "id": "p1" })).await;
        repo.read_resource("Project", "p1").await;
        repo.read_reference(&Reference::new("Project", "p1")).await;

        let calls = repo.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].is_mutation());
        assert_eq!(
            calls[1],
            RecordedCall::Read { resource_type: "Project".into(), id: "p1".into() }
        );
        assert_eq!(repo.mutation_count(), 1);

        repo.clear();
        assert!(repo.calls().is_empty());
    }
}
