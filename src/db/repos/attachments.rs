use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::error::DbResult;
use crate::models::attachment::Attachment;

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub id: Uuid,
    pub storage_key: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
    pub user_id: Uuid,
    pub entry_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait AttachmentRepo: Send + Sync {
    async fn create(&self, input: NewAttachment) -> DbResult<Attachment>;

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Attachment>>;

    async fn list_by_entry(&self, entry_id: Uuid) -> DbResult<Vec<Attachment>>;

    async fn soft_delete(&self, id: Uuid) -> DbResult<()>;

    /// Hard-deletes every attachment whose entry belongs to `group_id`.
    /// Called before entries are hard-deleted during group cascade delete.
    async fn hard_delete_by_group(&self, group_id: Uuid) -> DbResult<u64>;
}
