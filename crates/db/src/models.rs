//! Row struct for the `resources` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored resource. `content` is the full JSON, `meta` included.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResourceRow {
    pub resource_type: String,
    pub id: String,
    pub version_id: String,
    pub content: serde_json::Value,
    pub last_updated: DateTime<Utc>,
}
