//! Resource resolution for controls that accept "a reference or the thing itself".

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use db::Repository;
use fhir::{to_value, Reference, Resource};

/// Turns a reference into the resource JSON it points at.
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    /// `None` when the reference cannot be resolved, for whatever reason.
    async fn resolve(&self, reference: &Reference) -> Option<Value>;
}

/// Resolves references through a repository; non-ok outcomes resolve to nothing.
#[derive(Clone)]
pub struct RepositoryResolver {
    repo: Arc<dyn Repository>,
}

impl RepositoryResolver {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ResourceResolver for RepositoryResolver {
    async fn resolve(&self, reference: &Reference) -> Option<Value> {
        let (outcome, resource) = self.repo.read_reference(reference).await;
        if !outcome.is_ok() {
            debug!(?reference, outcome = outcome.id(), "reference did not resolve");
            return None;
        }
        resource
    }
}

/// Either a reference to a `T` or an inline `T`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSource<T> {
    Reference(Reference),
    Inline(T),
}

impl<T> From<Reference> for ResourceSource<T> {
    fn from(reference: Reference) -> Self {
        Self::Reference(reference)
    }
}

/// The resource behind `source`: inline values as-is, references resolved.
pub async fn use_resource<T: Resource>(
    source: &ResourceSource<T>,
    resolver: &dyn ResourceResolver,
) -> Option<Value> {
    match source {
        ResourceSource::Inline(resource) => to_value(resource).ok(),
        ResourceSource::Reference(reference) => resolver.resolve(reference).await,
    }
}
