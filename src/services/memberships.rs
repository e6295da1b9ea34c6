//! Membership management (§4.1): share/update/remove a group membership.
//! Every mutation requires manager access and emits an audit record; the
//! owner membership can never be removed or demoted here — only the
//! ownership-transfer state machine moves it.

use std::sync::Arc;

use uuid::Uuid;

use super::audit::AuditRecorder;
use crate::access::{AccessChecker, AccessLevel, CallerIdentity};
use crate::db::DbPool;
use crate::error::{CoreError, CoreResult};
use crate::models::membership::{AddMembership, ConversationMembership, MembershipAuditAction, UpdateMembership};

pub struct MembershipService {
    db: Arc<DbPool>,
    access: Arc<AccessChecker>,
    audit: AuditRecorder,
}

impl MembershipService {
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
                "membership operations require a user caller, not an agent key",
            )
        })
    }

    pub async fn list(&self, caller: &CallerIdentity, group_id: Uuid) -> CoreResult<Vec<ConversationMembership>> {
        let actor_user_id = Self::require_user(caller)?;
        self.access
            .require_access(actor_user_id, group_id, AccessLevel::Reader)
            .await?;
        self.db.memberships().list_by_group(group_id).await.map_err(Into::into)
    }

    pub async fn share(
        &self,
        caller: &CallerIdentity,
        group_id: Uuid,
        input: AddMembership,
    ) -> CoreResult<ConversationMembership> {
        let actor_user_id = Self::require_user(caller)?;
        self.access
            .require_access(actor_user_id, group_id, AccessLevel::Manager)
            .await?;

        let membership = self
            .db
            .memberships()
            .add(group_id, input.user_id, input.access_level)
            .await?;

        self.audit.record(
            MembershipAuditAction::Add,
            actor_user_id,
            group_id,
            input.user_id,
            None,
            Some(input.access_level),
        );

        Ok(membership)
    }

    pub async fn update(
        &self,
        caller: &CallerIdentity,
        group_id: Uuid,
        target_user_id: Uuid,
        input: UpdateMembership,
    ) -> CoreResult<ConversationMembership> {
        let actor_user_id = Self::require_user(caller)?;
        self.access
            .require_access(actor_user_id, group_id, AccessLevel::Manager)
            .await?;

        let existing = self
            .db
            .memberships()
            .get(group_id, target_user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("membership", target_user_id))?;

        if existing.access_level == AccessLevel::Owner {
            return Err(CoreError::validation(
                "access_level",
                "the owner membership cannot be changed directly; use an ownership transfer",
            ));
        }
        if input.access_level == AccessLevel::Owner {
            return Err(CoreError::validation(
                "access_level",
                "granting owner via update is not allowed; use an ownership transfer",
            ));
        }

        let updated = self
            .db
            .memberships()
            .update(group_id, target_user_id, input.access_level)
            .await?;

        self.audit.record(
            MembershipAuditAction::Update,
            actor_user_id,
            group_id,
            target_user_id,
            Some(existing.access_level),
            Some(input.access_level),
        );

        Ok(updated)
    }

    /// Removes a membership. Deleting the pending-transfer recipient
    /// auto-cancels the transfer (§4.1).
    pub async fn remove(&self, caller: &CallerIdentity, group_id: Uuid, target_user_id: Uuid) -> CoreResult<()> {
        let actor_user_id = Self::require_user(caller)?;
        self.access
            .require_access(actor_user_id, group_id, AccessLevel::Manager)
            .await?;

        let existing = self
            .db
            .memberships()
            .get(group_id, target_user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("membership", target_user_id))?;

        if existing.access_level == AccessLevel::Owner {
            return Err(CoreError::validation(
                "target_user_id",
                "the owner membership can never be removed",
            ));
        }

        self.db.memberships().remove(group_id, target_user_id).await?;
        self.db
            .transfers()
            .delete_by_group_and_recipient(group_id, target_user_id)
            .await?;

        self.audit.record(
            MembershipAuditAction::Remove,
            actor_user_id,
            group_id,
            target_user_id,
            Some(existing.access_level),
            None,
        );

        Ok(())
    }
}
