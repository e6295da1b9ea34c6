use async_trait::async_trait;
use uuid::Uuid;

use crate::db::error::DbResult;
use crate::models::transfer::OwnershipTransfer;

#[async_trait]
pub trait TransferRepo: Send + Sync {
    /// Fails with `DbError::Conflict` carrying the existing transfer's id if
    /// one is already pending for the group (enforced by a unique
    /// constraint on `group_id`, not a read-then-write check).
    async fn create(
        &self,
        group_id: Uuid,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> DbResult<OwnershipTransfer>;

    async fn get_by_group(&self, group_id: Uuid) -> DbResult<Option<OwnershipTransfer>>;

    async fn delete(&self, id: Uuid) -> DbResult<()>;

    /// Deletes any transfer in `group_id` whose recipient is `user_id`.
    /// Called when that membership is removed, per the auto-cancel rule.
    async fn delete_by_group_and_recipient(&self, group_id: Uuid, user_id: Uuid)
        -> DbResult<()>;

    /// Atomically: demote the current owner membership to manager, upsert
    /// `to_user_id` as owner, set `owner_user_id` on every non-deleted
    /// conversation in the group, and delete the transfer row.
    async fn accept(&self, transfer: &OwnershipTransfer) -> DbResult<()>;
}
