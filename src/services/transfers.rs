//! Ownership transfer state machine (§4.1): create (owner-only, at-most
//! one pending per group), accept (recipient-only, atomic), and
//! delete (sender cancels, recipient rejects — no partial-acceptance
//! states exist, per §8 invariant 5).

use std::sync::Arc;

use uuid::Uuid;

use super::audit::AuditRecorder;
use crate::access::{AccessChecker, AccessLevel, CallerIdentity};
use crate::db::{DbError, DbPool};
use crate::error::{CoreError, CoreResult};
use crate::models::membership::MembershipAuditAction;
use crate::models::transfer::{OwnershipTransfer, TRANSFER_ALREADY_PENDING, TransferResolution};

pub struct TransferService {
    db: Arc<DbPool>,
    access: Arc<AccessChecker>,
    audit: AuditRecorder,
}

impl TransferService {
    pub fn new(db: Arc<DbPool>, access: Arc<AccessChecker>, events: Arc<crate::events::EventBus>) -> Self {
        Self {
            db,
            access,
            audit: AuditRecorder::new(events),
        }
    }

    fn require_user(caller: &CallerIdentity) -> CoreResult<Uuid> {
        caller.user_id().ok_or_else(|| {
            CoreError::validation(
                "actor",
                "ownership transfers require a user caller, not an agent key",
            )
        })
    }

    pub async fn get(&self, caller: &CallerIdentity, group_id: Uuid) -> CoreResult<Option<OwnershipTransfer>> {
        let actor_user_id = Self::require_user(caller)?;
        self.access
            .require_access(actor_user_id, group_id, AccessLevel::Reader)
            .await?;
        self.db.transfers().get_by_group(group_id).await.map_err(Into::into)
    }

    pub async fn create(
        &self,
        caller: &CallerIdentity,
        group_id: Uuid,
        to_user_id: Uuid,
    ) -> CoreResult<OwnershipTransfer> {
        let actor_user_id = Self::require_user(caller)?;
        self.access
            .require_access(actor_user_id, group_id, AccessLevel::Owner)
            .await?;

        if actor_user_id == to_user_id {
            return Err(CoreError::validation(
                "to_user_id",
                "cannot transfer ownership to yourself",
            ));
        }

        let recipient = self.db.memberships().get(group_id, to_user_id).await?;
        if recipient.is_none() {
            return Err(CoreError::validation(
                "to_user_id",
                "the recipient must already be a group member",
            ));
        }

        match self.db.transfers().create(group_id, actor_user_id, to_user_id).await {
            Ok(transfer) => Ok(transfer),
            Err(DbError::Conflict(existing_id)) => {
                Err(CoreError::conflict(TRANSFER_ALREADY_PENDING, Some(existing_id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically demotes the previous owner to manager, upserts the
    /// recipient as owner, updates `ownerUserId` on every non-deleted
    /// conversation in the group, and deletes the transfer row (§4.1,
    /// §5 "Shared resources"). Only the recipient may accept.
    pub async fn accept(&self, caller: &CallerIdentity, group_id: Uuid) -> CoreResult<()> {
        let actor_user_id = Self::require_user(caller)?;
        let transfer = self
            .db
            .transfers()
            .get_by_group(group_id)
            .await?
            .ok_or_else(|| CoreError::not_found("ownership_transfer", group_id))?;

        if transfer.to_user_id != actor_user_id {
            return Err(CoreError::forbidden(AccessLevel::Owner));
        }

        self.db.transfers().accept(&transfer).await?;

        self.audit.record(
            MembershipAuditAction::Transfer,
            actor_user_id,
            group_id,
            transfer.from_user_id,
            Some(AccessLevel::Owner),
            Some(AccessLevel::Manager),
        );

        Ok(())
    }

    /// The sender cancels, or the recipient rejects. Either way the
    /// pending transfer is dropped with no membership change.
    pub async fn delete(&self, caller: &CallerIdentity, group_id: Uuid) -> CoreResult<TransferResolution> {
        let actor_user_id = Self::require_user(caller)?;
        let transfer = self
            .db
            .transfers()
            .get_by_group(group_id)
            .await?
            .ok_or_else(|| CoreError::not_found("ownership_transfer", group_id))?;

        if transfer.from_user_id != actor_user_id && transfer.to_user_id != actor_user_id {
            return Err(CoreError::forbidden(AccessLevel::Owner));
        }

        self.db.transfers().delete(transfer.id).await?;
        Ok(TransferResolution::Cancel)
    }
}
