use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ListParams, ListResult};
use crate::db::error::DbResult;
use crate::models::conversation::{EncryptedConversationRow, ListConversationsMode};

/// Row shape accepted by `create`. Title arrives already encrypted; the
/// engine owns the encryption envelope, not the repository.
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub id: Uuid,
    pub group_id: Uuid,
    pub owner_user_id: Uuid,
    pub title_ciphertext: Vec<u8>,
    pub metadata: serde_json::Value,
    pub forked_at_conversation_id: Option<Uuid>,
    pub forked_at_entry_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ConversationUpdate {
    pub title_ciphertext: Option<Vec<u8>>,
    pub metadata: Option<serde_json::Value>,
}

#[async_trait]
pub trait ConversationRepo: Send + Sync {
    async fn create(&self, input: NewConversation) -> DbResult<EncryptedConversationRow>;

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<EncryptedConversationRow>>;

    /// Conversations in `group_id`, ordered by `created_at` ascending — the
    /// full fork tree for a group (`ListForks`).
    async fn list_by_group(&self, group_id: Uuid) -> DbResult<Vec<EncryptedConversationRow>>;

    async fn update(
        &self,
        id: Uuid,
        input: ConversationUpdate,
    ) -> DbResult<EncryptedConversationRow>;

    /// Soft-deletes a single conversation (not the group it belongs to).
    async fn soft_delete(&self, id: Uuid) -> DbResult<()>;

    /// Lists conversations visible to `user_id` (i.e. those in a group the
    /// user has any membership in), filtered by `mode` and paginated by
    /// `(updated_at, id)`. Encrypted-title search is performed by the
    /// caller via bounded decrypt-then-filter over-fetch, not here.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        mode: ListConversationsMode,
        params: ListParams,
    ) -> DbResult<ListResult<EncryptedConversationRow>>;

    /// Sets `owner_user_id` on every non-deleted conversation in the group.
    /// Used only inside the ownership-transfer acceptance transaction.
    async fn set_owner_for_group(&self, group_id: Uuid, owner_user_id: Uuid) -> DbResult<()>;

    async fn hard_delete_soft_deleted_before(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: u32,
        max_deletes: u64,
    ) -> DbResult<u64>;
}
