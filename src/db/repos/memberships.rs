use async_trait::async_trait;
use uuid::Uuid;

use crate::db::error::DbResult;
use crate::models::membership::{AccessLevel, ConversationMembership};

#[async_trait]
pub trait MembershipRepo: Send + Sync {
    async fn add(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        access_level: AccessLevel,
    ) -> DbResult<ConversationMembership>;

    async fn get(&self, group_id: Uuid, user_id: Uuid) -> DbResult<Option<ConversationMembership>>;

    async fn update(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        access_level: AccessLevel,
    ) -> DbResult<ConversationMembership>;

    /// Hard-deletes the membership row. Never removes the owner.
    async fn remove(&self, group_id: Uuid, user_id: Uuid) -> DbResult<()>;

    async fn list_by_group(&self, group_id: Uuid) -> DbResult<Vec<ConversationMembership>>;

    async fn get_owner(&self, group_id: Uuid) -> DbResult<Option<ConversationMembership>>;

    /// Hard-deletes every membership in the group; returns the removed rows
    /// so the caller can emit one audit record per removal.
    async fn remove_all_for_group(&self, group_id: Uuid) -> DbResult<Vec<ConversationMembership>>;
}
