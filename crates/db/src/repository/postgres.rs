//! Postgres repository over the `resources` table.
//!
//! Filters are evaluated in Rust over a per-type scan ordered by `seq`, so
//! search results come back in the order rows were first inserted.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use fhir::{Bundle, Outcome, SearchRequest};

use super::{resource_key, same_content, stamp, Repository, RepositoryResult};
use crate::{models::ResourceRow, pool, DbError};

#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool and migrate the `resources` schema before handing out the store.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, DbError> {
        let pool = pool::create_pool(database_url, max_connections).await?;
        pool::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    async fn insert(&self, resource_type: &str, mut resource: Value, id: &str) -> Result<Value, DbError> {
        let (version_id, now) = stamp(&mut resource, id);
        sqlx::query(
            r#"
            INSERT INTO resources (resource_type, id, version_id, content, last_updated)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(resource_type)
        .bind(id)
        .bind(&version_id)
        .bind(&resource)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(resource)
    }

    async fn fetch(&self, resource_type: &str, id: &str) -> Result<ResourceRow, DbError> {
        sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT resource_type, id, version_id, content, last_updated
            FROM resources
            WHERE resource_type = $1 AND id = $2
            "#,
        )
        .bind(resource_type)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)
    }

    /// Insert-or-replace inside one transaction, locking the existing row.
    async fn upsert(&self, resource_type: &str, id: &str, mut resource: Value) -> Result<(Outcome, Value), DbError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT resource_type, id, version_id, content, last_updated
            FROM resources
            WHERE resource_type = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(resource_type)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            Some(row) if same_content(&row.content, &resource) => {
                tx.rollback().await?;
                return Ok((Outcome::NotModified, row.content));
            }
            Some(_) => {
                let (version_id, now) = stamp(&mut resource, id);
                sqlx::query(
                    r#"
                    UPDATE resources
                    SET version_id = $3, content = $4, last_updated = $5
                    WHERE resource_type = $1 AND id = $2
                    "#,
                )
                .bind(resource_type)
                .bind(id)
                .bind(&version_id)
                .bind(&resource)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                Outcome::Ok
            }
            None => {
                let (version_id, now) = stamp(&mut resource, id);
                sqlx::query(
                    r#"
                    INSERT INTO resources (resource_type, id, version_id, content, last_updated)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(resource_type)
                .bind(id)
                .bind(&version_id)
                .bind(&resource)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                Outcome::Created
            }
        };

        tx.commit().await?;
        Ok((outcome, resource))
    }

    async fn scan(&self, resource_type: &str) -> Result<Vec<Value>, DbError> {
        let rows: Vec<(Value,)> = sqlx::query_as(
            "SELECT content FROM resources WHERE resource_type = $1 ORDER BY seq ASC",
        )
        .bind(resource_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(content,)| content).collect())
    }
}

fn is_unique_violation(err: &DbError) -> bool {
    matches!(err, DbError::Sqlx(e) if e.as_database_error().is_some_and(|d| d.is_unique_violation()))
}

/// Run `op` again when it lost an insert race on the primary key.
///
/// The second attempt finds the winner's row and takes the update path.
async fn retry_on_conflict<T, F, Fut>(mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    match op().await {
        Err(e) if is_unique_violation(&e) => {
            warn!("concurrent insert detected, retrying");
            op().await
        }
        other => other,
    }
}

fn failed<T>(op: &str, err: DbError) -> RepositoryResult<T> {
    error!("{op} failed: {err}");
    (err.into(), None)
}

#[async_trait]
impl Repository for PgRepository {
    #[instrument(skip(self, resource))]
    async fn create_resource(&self, resource: Value) -> RepositoryResult<Value> {
        let (resource_type, id) = match resource_key(&resource, false) {
            Ok(key) => key,
            Err(outcome) => return (outcome, None),
        };
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        match self.insert(&resource_type, resource, &id).await {
            Ok(created) => (Outcome::Created, Some(created)),
            Err(e) if is_unique_violation(&e) => {
                (
                    Outcome::BadRequest(format!("{resource_type}/{id} already exists")),
                    None,
                )
            }
            Err(e) => failed("create", e),
        }
    }

    #[instrument(skip(self))]
    async fn read_resource(&self, resource_type: &str, id: &str) -> RepositoryResult<Value> {
        match self.fetch(resource_type, id).await {
            Ok(row) => (Outcome::Ok, Some(row.content)),
            Err(DbError::NotFound) => (Outcome::NotFound, None),
            Err(e) => failed("read", e),
        }
    }

    #[instrument(skip(self, resource))]
    async fn update_resource(&self, resource: Value) -> RepositoryResult<Value> {
        let (resource_type, id) = match resource_key(&resource, true) {
            Ok((ty, Some(id))) => (ty, id),
            Ok((_, None)) => return (Outcome::BadRequest("Missing id".into()), None),
            Err(outcome) => return (outcome, None),
        };
        let result =
            retry_on_conflict(|| self.upsert(&resource_type, &id, resource.clone())).await;
        match result {
            Ok((outcome, stored)) => (outcome, Some(stored)),
            Err(e) if is_unique_violation(&e) => (
                Outcome::BadRequest(format!("{resource_type}/{id} was written concurrently")),
                None,
            ),
            Err(e) => failed("update", e),
        }
    }

    #[instrument(skip(self), fields(resource_type = %request.resource_type))]
    async fn search(&self, request: &SearchRequest) -> RepositoryResult<Bundle> {
        match self.scan(&request.resource_type).await {
            Ok(all) => {
                let found = all.into_iter().filter(|r| request.matches(r)).collect();
                (Outcome::Ok, Some(Bundle::searchset(found)))
            }
            Err(e) => failed("search", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    #[derive(Debug)]
    struct DuplicateKey;

    impl fmt::Display for DuplicateKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("duplicate key value violates unique constraint")
        }
    }

    impl StdError for DuplicateKey {}

    impl DatabaseError for DuplicateKey {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    fn duplicate_key() -> DbError {
        DbError::Sqlx(sqlx::Error::Database(Box::new(DuplicateKey)))
    }

    #[test]
    fn detects_unique_violations() {
        assert!(is_unique_violation(&duplicate_key()));
        assert!(!is_unique_violation(&DbError::NotFound));
    }

    #[tokio::test]
    async fn lost_insert_race_is_retried_once() {
        let mut attempts = 0;
        let result = retry_on_conflict(|| {
            attempts += 1;
            let attempt = attempts;
            async move {
                if attempt == 1 {
                    Err(duplicate_key())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn second_conflict_is_returned() {
        let mut attempts = 0;
        let result: Result<(), DbError> = retry_on_conflict(|| {
            attempts += 1;
            async { Err(duplicate_key()) }
        })
        .await;
        assert!(is_unique_violation(&result.unwrap_err()));
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let mut attempts = 0;
        let result: Result<(), DbError> = retry_on_conflict(|| {
            attempts += 1;
            async { Err(DbError::NotFound) }
        })
        .await;
        assert!(matches!(result, Err(DbError::NotFound)));
        assert_eq!(attempts, 1);
    }
}
