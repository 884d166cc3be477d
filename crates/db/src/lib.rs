//! `db` crate: the resource repository.
//!
//! Defines the [`Repository`] trait every store implements, an in-memory
//! store for tests and local runs, and a Postgres store backed by a single
//! JSONB `resources` table. No request handling or permission logic lives here.

pub mod error;
pub mod pool;
pub mod repository;
pub mod models;

pub use pool::DbPool;
pub use error::DbError;
pub use repository::{
    MemoryRepository, PgRepository, RecordedCall, RecordingRepository, Repository,
    RepositoryResult,
};
