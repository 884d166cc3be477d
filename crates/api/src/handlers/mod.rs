pub mod health;
pub mod projects;

use std::sync::Arc;

use db::Repository;

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}
