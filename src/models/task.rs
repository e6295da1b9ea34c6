use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A persisted unit of background work (vector indexing, spool cleanup).
/// Single source of truth in the primary datastore, not a separate broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct Task {
    pub id: Uuid,
    pub task_type: String,
    /// Unique when set; gives idempotent `create` semantics.
    pub task_name: Option<String>,
    pub body: Value,
    pub retry_at: DateTime<Utc>,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub task_type: String,
    pub body: Value,
    pub task_name: Option<String>,
}
