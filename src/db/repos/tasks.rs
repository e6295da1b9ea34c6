use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::error::DbResult;
use crate::models::task::{CreateTask, Task};

#[async_trait]
pub trait TaskRepo: Send + Sync {
    /// Idempotent when `task_name` is set: a second `create` with the same
    /// name returns the existing row instead of inserting a duplicate.
    async fn create(&self, input: CreateTask) -> DbResult<Task>;

    /// Atomically leases up to `limit` rows whose `retry_at <= now`,
    /// ordered by `retry_at`. Claimed rows are not visible to a concurrent
    /// `claim_ready` call until they are `succeed`d or `fail`ed.
    async fn claim_ready(&self, limit: u32) -> DbResult<Vec<Task>>;

    async fn succeed(&self, id: Uuid) -> DbResult<()>;

    async fn fail(&self, id: Uuid, error: String, retry_at: DateTime<Utc>) -> DbResult<()>;
}
