use async_trait::async_trait;
use uuid::Uuid;

use crate::db::error::DbResult;
use crate::models::group::ConversationGroup;

/// The access-control boundary. Creating a group and soft-deleting it
/// (which cascades to every conversation, membership, entry, transfer and
/// attachment it owns) are the only mutations; groups are never updated.
#[async_trait]
pub trait GroupRepo: Send + Sync {
    async fn create(&self, id: Uuid) -> DbResult<ConversationGroup>;

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<ConversationGroup>>;

    /// Soft-deletes the group and hard-deletes everything it owns:
    /// attachments, entries, memberships and ownership transfers in the
    /// group, then soft-deletes every conversation in the group.
    async fn delete_cascade(&self, id: Uuid) -> DbResult<()>;
}
