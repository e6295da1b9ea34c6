//! Conversation/Group Store (§4.1): conversation CRUD, fork creation, and
//! `ListConversations`/`ListForks`. The Entry Engine owns entries; this
//! service owns the conversation and group rows that frame them.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use super::audit::AuditRecorder;
use crate::access::{AccessChecker, AccessLevel, CallerIdentity};
use crate::db::{
    DbPool,
    repos::{
        ListParams, ListResult,
        conversations::{ConversationUpdate, NewConversation},
    },
};
use crate::encryption::EnvelopeService;
use crate::error::{CoreError, CoreResult};
use crate::events::EventBus;
use crate::models::conversation::{
    Conversation, CreateConversation, EncryptedConversationRow, ForkSpec, ListConversationsMode,
    UpdateConversation,
};
use crate::models::membership::MembershipAuditAction;

/// Over-fetch bound for encrypted-title search (§9 "Encrypted title
/// search"): at most 5x the requested limit, capped at 1000 rows.
const TEXT_SEARCH_OVERFETCH_MULTIPLIER: i64 = 5;
const TEXT_SEARCH_OVERFETCH_CAP: i64 = 1000;

pub struct ConversationService {
    db: Arc<DbPool>,
    access: Arc<AccessChecker>,
    encryption: Arc<EnvelopeService>,
    audit: AuditRecorder,
}

impl ConversationService {
    pub fn new(
        db: Arc<DbPool>,
        access: Arc<AccessChecker>,
        encryption: Arc<EnvelopeService>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            db,
            access,
            encryption,
            audit: AuditRecorder::new(events),
        }
    }

    fn require_user(caller: &CallerIdentity) -> CoreResult<Uuid> {
        caller.user_id().ok_or_else(|| {
            CoreError::validation(
                "actor",
                "this operation requires a user caller, not an agent key",
            )
        })
    }

    async fn decrypt(&self, row: &EncryptedConversationRow) -> CoreResult<Conversation> {
        let plaintext = self.encryption.decrypt(&row.title_ciphertext)?;
        let title = String::from_utf8(plaintext)
            .map_err(|e| CoreError::Internal(format!("decrypted title is not UTF-8: {e}")))?;
        Ok(Conversation {
            id: row.id,
            group_id: row.group_id,
            owner_user_id: row.owner_user_id,
            title,
            metadata: row.metadata.clone(),
            forked_at_conversation_id: row.forked_at_conversation_id,
            forked_at_entry_id: row.forked_at_entry_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }

    // ── CreateConversation (§4.1) ────────────────────────────────────────

    pub async fn create(
        &self,
        caller: &CallerIdentity,
        input: CreateConversation,
    ) -> CoreResult<Conversation> {
        let actor_user_id = Self::require_user(caller)?;
        let title_ciphertext = self
            .encryption
            .encrypt(input.title.unwrap_or_default().as_bytes())?;
        let metadata = metadata_to_value(&input.metadata);

        let row = match input.forked_from {
            None => {
                let id = Uuid::new_v4();
                let group = self.db.groups().create(id).await?;
                self.db
                    .memberships()
                    .add(group.id, actor_user_id, AccessLevel::Owner)
                    .await?;
                self.db
                    .conversations()
                    .create(NewConversation {
                        id,
                        group_id: group.id,
                        owner_user_id: actor_user_id,
                        title_ciphertext,
                        metadata,
                        forked_at_conversation_id: None,
                        forked_at_entry_id: None,
                    })
                    .await?
            }
            Some(ForkSpec {
                parent_conversation_id,
                at_entry_id,
            }) => {
                let parent = self
                    .db
                    .conversations()
                    .get_by_id(parent_conversation_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("conversation", parent_conversation_id))?;
                self.access
                    .require_access(actor_user_id, parent.group_id, AccessLevel::Reader)
                    .await?;

                let group_entries = self.db.entries().list_by_group_ordered(parent.group_id).await?;
                let fork_index = group_entries
                    .iter()
                    .position(|e| e.id == at_entry_id)
                    .ok_or_else(|| CoreError::not_found("entry", at_entry_id))?;

                // The stored fork point is the entry immediately before the
                // requested one in group order, or null if it is the first
                // entry in the group — a blank-slate fork (§4.1, §9).
                let forked_at_entry_id = if fork_index == 0 {
                    None
                } else {
                    Some(group_entries[fork_index - 1].id)
                };

                self.db
                    .conversations()
                    .create(NewConversation {
                        id: Uuid::new_v4(),
                        group_id: parent.group_id,
                        owner_user_id: actor_user_id,
                        title_ciphertext,
                        metadata,
                        forked_at_conversation_id: Some(parent_conversation_id),
                        forked_at_entry_id,
                    })
                    .await?
            }
        };

        self.decrypt(&row).await
    }

    pub async fn get(&self, caller: &CallerIdentity, conversation_id: Uuid) -> CoreResult<Conversation> {
        let actor_user_id = Self::require_user(caller)?;
        let row = self
            .db
            .conversations()
            .get_by_id(conversation_id)
            .await?
            .ok_or_else(|| CoreError::not_found("conversation", conversation_id))?;
        self.access
            .require_access(actor_user_id, row.group_id, AccessLevel::Reader)
            .await?;
        self.decrypt(&row).await
    }

    pub async fn update(
        &self,
        caller: &CallerIdentity,
        conversation_id: Uuid,
        input: UpdateConversation,
    ) -> CoreResult<Conversation> {
        let actor_user_id = Self::require_user(caller)?;
        let row = self
            .db
            .conversations()
            .get_by_id(conversation_id)
            .await?
            .ok_or_else(|| CoreError::not_found("conversation", conversation_id))?;
        self.access
            .require_access(actor_user_id, row.group_id, AccessLevel::Writer)
            .await?;

        let title_ciphertext = match input.title {
            Some(title) => Some(self.encryption.encrypt(title.as_bytes())?),
            None => None,
        };
        let metadata = input.metadata.as_ref().map(metadata_to_value);

        let updated = self
            .db
            .conversations()
            .update(
                conversation_id,
                ConversationUpdate {
                    title_ciphertext,
                    metadata,
                },
            )
            .await?;
        self.decrypt(&updated).await
    }

    /// Soft-deletes the conversation's group, cascading to every
    /// conversation, membership, entry, transfer and attachment it owns
    /// (§3.1, §3.2). Requires owner. Emits one audit record per removed
    /// membership.
    pub async fn delete(&self, caller: &CallerIdentity, conversation_id: Uuid) -> CoreResult<()> {
        let actor_user_id = Self::require_user(caller)?;
        let row = self
            .db
            .conversations()
            .get_by_id(conversation_id)
            .await?
            .ok_or_else(|| CoreError::not_found("conversation", conversation_id))?;
        self.access
            .require_access(actor_user_id, row.group_id, AccessLevel::Owner)
            .await?;

        let memberships = self.db.memberships().list_by_group(row.group_id).await?;
        self.db.groups().delete_cascade(row.group_id).await?;

        for membership in memberships {
            self.audit.record(
                MembershipAuditAction::Remove,
                actor_user_id,
                row.group_id,
                membership.user_id,
                Some(membership.access_level),
                None,
            );
        }

        Ok(())
    }

    /// `ListForks`: every conversation in `conversation_id`'s group,
    /// ordered by `created_at`.
    pub async fn list_forks(
        &self,
        caller: &CallerIdentity,
        conversation_id: Uuid,
    ) -> CoreResult<Vec<Conversation>> {
        let actor_user_id = Self::require_user(caller)?;
        let row = self
            .db
            .conversations()
            .get_by_id(conversation_id)
            .await?
            .ok_or_else(|| CoreError::not_found("conversation", conversation_id))?;
        self.access
            .require_access(actor_user_id, row.group_id, AccessLevel::Reader)
            .await?;

        let rows = self.db.conversations().list_by_group(row.group_id).await?;
        let mut forks = Vec::with_capacity(rows.len());
        for r in &rows {
            forks.push(self.decrypt(r).await?);
        }
        Ok(forks)
    }

    /// `ListConversations`: modes `all`/`roots`/`latest-fork`, optional
    /// decrypt-then-filter text search over titles (§4.1, §9).
    pub async fn list(
        &self,
        caller: &CallerIdentity,
        mode: ListConversationsMode,
        params: ListParams,
        text_query: Option<&str>,
    ) -> CoreResult<ListResult<Conversation>> {
        let actor_user_id = Self::require_user(caller)?;
        let requested_limit = params.limit.unwrap_or(50).max(1);

        let fetch_params = match text_query {
            Some(_) => {
                let fetch_limit =
                    (requested_limit * TEXT_SEARCH_OVERFETCH_MULTIPLIER).min(TEXT_SEARCH_OVERFETCH_CAP);
                ListParams {
                    limit: Some(fetch_limit),
                    ..params.clone()
                }
            }
            None => params.clone(),
        };

        let result = self
            .db
            .conversations()
            .list_for_user(actor_user_id, mode, fetch_params)
            .await?;

        let mut decrypted = Vec::with_capacity(result.items.len());
        for row in &result.items {
            decrypted.push(self.decrypt(row).await?);
        }

        let mut filtered = match text_query {
            Some(query) => {
                let needle = query.to_lowercase();
                decrypted
                    .into_iter()
                    .filter(|c| c.title.to_lowercase().contains(&needle))
                    .take(requested_limit as usize)
                    .collect()
            }
            None => decrypted,
        };

        if matches!(mode, ListConversationsMode::LatestFork) {
            filtered = dedupe_latest_fork(filtered);
        }

        Ok(ListResult::new(filtered, result.has_more, result.cursors))
    }
}

fn metadata_to_value(metadata: &HashMap<String, serde_json::Value>) -> serde_json::Value {
    serde_json::Value::Object(metadata.clone().into_iter().collect())
}

/// Keeps only the most recently updated conversation per group. Input is
/// assumed ordered by `updated_at` descending (the repository's default
/// sort order), so the first occurrence of a group is its latest fork.
fn dedupe_latest_fork(conversations: Vec<Conversation>) -> Vec<Conversation> {
    let mut seen = std::collections::HashSet::new();
    conversations
        .into_iter()
        .filter(|c| seen.insert(c.group_id))
        .collect()
}
