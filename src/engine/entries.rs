//! Entry Engine operations: `GetEntries` (§4.2.2), `AppendEntries`
//! (§4.2.3), and `SyncAgentEntry` (§4.2.4).

use std::sync::Arc;

use uuid::Uuid;

use super::ancestry::build_ancestry;
use super::memory_items;
use crate::{
    access::{AccessChecker, AccessLevel, CallerIdentity},
    cache::{CachedAgentEntries, MemoryEntriesCache},
    db::{
        DbPool,
        repos::{conversations::NewConversation, entries::NewEntry},
    },
    encryption::EnvelopeService,
    error::{CoreError, CoreResult},
    models::{
        conversation::{Conversation, ForkSpec},
        entry::{
            AppendEntriesRequest, AppendEntry, Channel, Entry, EncryptedEntryRow, EpochFilter,
            GetEntriesParams, SyncResult,
        },
        group::ConversationGroup,
    },
    observability::metrics,
};

/// Result of `AppendEntries`: the conversation appended to (freshly
/// created or pre-existing) and the entries written, in request order.
#[derive(Debug, Clone)]
pub struct AppendEntriesResult {
    pub conversation: Conversation,
    pub entries: Vec<Entry>,
}

/// Entry point for the three Entry Engine operations. Holds references
/// to everything they need: storage, access control, the encryption
/// envelope, and the Memory-Entries Cache.
pub struct EntryEngine {
    db: Arc<DbPool>,
    access: Arc<AccessChecker>,
    encryption: Arc<EnvelopeService>,
    memory_cache: Arc<MemoryEntriesCache>,
}

const TITLE_MAX_LEN: usize = 40;

impl EntryEngine {
    pub fn new(
        db: Arc<DbPool>,
        access: Arc<AccessChecker>,
        encryption: Arc<EnvelopeService>,
        memory_cache: Arc<MemoryEntriesCache>,
    ) -> Self {
        Self {
            db,
            access,
            encryption,
            memory_cache,
        }
    }

    /// For a `User` caller, enforces the access lattice against group
    /// membership. For an `Agent` caller, the engine has no group-scoped
    /// authorization table of its own — `AgentsConfig` maps an API key to
    /// a bare `clientId` with no group scoping — so an already-authenticated
    /// agent credential is trusted by the shell that resolved it, and the
    /// engine does not re-check membership for it.
    async fn require_caller_access(
        &self,
        caller: &CallerIdentity,
        group_id: Uuid,
        min_level: AccessLevel,
    ) -> CoreResult<()> {
        match caller.user_id() {
            Some(user_id) => {
                self.access.require_access(user_id, group_id, min_level).await?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn decrypt_row(&self, row: &EncryptedEntryRow) -> CoreResult<Entry> {
        let plaintext = self.encryption.decrypt(&row.content_ciphertext)?;
        let content = String::from_utf8(plaintext)
            .map_err(|e| CoreError::Internal(format!("decrypted content is not UTF-8: {e}")))?;
        Ok(Entry {
            id: row.id,
            conversation_id: row.conversation_id,
            group_id: row.group_id,
            user_id: row.user_id,
            client_id: row.client_id.clone(),
            channel: row.channel,
            epoch: row.epoch,
            content_type: row.content_type.clone(),
            content,
            indexed_content: row.indexed_content.clone(),
            indexed_at: row.indexed_at,
            created_at: row.created_at,
        })
    }

    // ── GetEntries (§4.2.2) ─────────────────────────────────────────────

    pub async fn get_entries(
        &self,
        caller: &CallerIdentity,
        params: GetEntriesParams,
    ) -> CoreResult<(Vec<Entry>, Option<Uuid>)> {
        if params.channel == Some(Channel::Memory) && params.client_id.is_none() {
            return Err(CoreError::validation(
                "client_id",
                "clientId is required when channel=MEMORY",
            ));
        }

        let conversation = self
            .db
            .conversations()
            .get_by_id(params.conversation_id)
            .await?
            .ok_or_else(|| CoreError::not_found("conversation", params.conversation_id))?;
        let group_id = conversation.group_id;

        self.require_caller_access(caller, group_id, AccessLevel::Reader).await?;

        let all_entries = self.db.entries().list_by_group_ordered(group_id).await?;

        let ancestry_filtered: Vec<&EncryptedEntryRow> = if params.all_forks {
            all_entries.iter().collect()
        } else {
            let conversations = self.db.conversations().list_by_group(group_id).await?;
            let ancestry = build_ancestry(&conversations, params.conversation_id)?;
            filter_by_ancestry(&all_entries, &ancestry)
        };

        let channel_and_epoch_filtered =
            apply_channel_and_epoch(ancestry_filtered, params.channel, params.epoch_filter, params.client_id.as_deref());

        let (page, next_cursor) = paginate(channel_and_epoch_filtered, params.after_entry_id, params.limit);

        let mut entries = Vec::with_capacity(page.len());
        for row in page {
            entries.push(self.decrypt_row(row).await?);
        }

        Ok((entries, next_cursor))
    }

    // ── AppendEntries (§4.2.3) ──────────────────────────────────────────

    pub async fn append_entries(
        &self,
        caller: &CallerIdentity,
        request: AppendEntriesRequest,
    ) -> CoreResult<AppendEntriesResult> {
        for entry in &request.entries {
            validate_append_entry(entry)?;
        }

        let (conversation, created) = self.resolve_or_create_conversation(caller, &request).await?;

        if !created {
            self.require_caller_access(caller, conversation.group_id, AccessLevel::Writer)
                .await?;
        }

        let mut new_rows = Vec::with_capacity(request.entries.len());
        for entry in &request.entries {
            let epoch = match entry.channel {
                Channel::History => None,
                Channel::Memory => Some(entry.epoch.unwrap_or(1)),
            };
            let ciphertext = self.encryption.encrypt(entry.content.as_bytes())?;
            new_rows.push(NewEntry {
                id: Uuid::new_v4(),
                conversation_id: conversation.id,
                group_id: conversation.group_id,
                user_id: entry.user_id,
                client_id: entry.client_id.clone(),
                channel: entry.channel,
                epoch,
                content_type: entry.content_type.clone(),
                content_ciphertext: ciphertext,
                indexed_content: entry.indexed_content.clone(),
            });
        }

        let inserted = self.db.entries().insert_batch(new_rows).await?;

        let mut entries = Vec::with_capacity(inserted.len());
        for row in &inserted {
            metrics::record_entry_appended(row.channel.as_str());
            entries.push(self.decrypt_row(row).await?);
        }

        self.warm_memory_cache_for_appended(&conversation, &entries).await?;

        Ok(AppendEntriesResult { conversation, entries })
    }

    /// Resolves `request.conversation_id` to an existing conversation, or
    /// auto-creates one (§4.2.3). Returns the created-or-found conversation
    /// and whether it was freshly created (skipping the writer-access
    /// check below it, since the caller is necessarily its owner).
    async fn resolve_or_create_conversation(
        &self,
        caller: &CallerIdentity,
        request: &AppendEntriesRequest,
    ) -> CoreResult<(Conversation, bool)> {
        if let Some(conversation_id) = request.conversation_id
            && let Some(existing) = self.db.conversations().get_by_id(conversation_id).await?
        {
            return Ok((self.decrypt_conversation(&existing).await?, false));
        }

        let owner_user_id = caller.user_id().ok_or_else(|| {
            CoreError::validation(
                "conversation_id",
                "auto-creating a conversation requires a user caller, not an agent key",
            )
        })?;

        let conversation_id = request.conversation_id.unwrap_or_else(Uuid::new_v4);
        let title = infer_title(&request.entries);
        let title_ciphertext = self.encryption.encrypt(title.unwrap_or_default().as_bytes())?;

        let (group_id, forked_at_entry_id) = match &request.forked_from {
            Some(ForkSpec {
                parent_conversation_id,
                at_entry_id,
            }) => {
                let parent = self
                    .db
                    .conversations()
                    .get_by_id(*parent_conversation_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("conversation", *parent_conversation_id))?;
                self.require_caller_access(caller, parent.group_id, AccessLevel::Writer)
                    .await?;

                // The stored fence is the entry immediately before the
                // requested fork point in group order, or null if it is
                // the first entry in the group (§4.1, §9).
                let group_entries = self.db.entries().list_by_group_ordered(parent.group_id).await?;
                let fork_index = group_entries
                    .iter()
                    .position(|e| e.id == *at_entry_id)
                    .ok_or_else(|| CoreError::not_found("entry", *at_entry_id))?;
                let forked_at_entry_id = if fork_index == 0 {
                    None
                } else {
                    Some(group_entries[fork_index - 1].id)
                };

                (parent.group_id, forked_at_entry_id)
            }
            None => {
                let group: ConversationGroup = self.db.groups().create(conversation_id).await?;
                self.db
                    .memberships()
                    .add(group.id, owner_user_id, AccessLevel::Owner)
                    .await?;
                (group.id, None)
            }
        };

        let created = self
            .db
            .conversations()
            .create(NewConversation {
                id: conversation_id,
                group_id,
                owner_user_id,
                title_ciphertext,
                metadata: serde_json::Value::Object(Default::default()),
                forked_at_conversation_id: request.forked_from.as_ref().map(|f| f.parent_conversation_id),
                forked_at_entry_id,
            })
            .await?;

        Ok((self.decrypt_conversation(&created).await?, true))
    }

    async fn decrypt_conversation(
        &self,
        row: &crate::models::conversation::EncryptedConversationRow,
    ) -> CoreResult<Conversation> {
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

    async fn warm_memory_cache_for_appended(
        &self,
        conversation: &Conversation,
        entries: &[Entry],
    ) -> CoreResult<()> {
        let mut client_ids: Vec<String> = entries
            .iter()
            .filter(|e| e.channel == Channel::Memory)
            .filter_map(|e| e.client_id.clone())
            .collect();
        client_ids.sort();
        client_ids.dedup();

        for client_id in client_ids {
            self.recompute_and_cache(conversation.id, &client_id).await?;
        }
        Ok(())
    }

    /// Recomputes the latest-epoch MEMORY view for `(conversation_id,
    /// client_id)` via `get_entries` and stores it, clearing the cache
    /// entry if the recomputation is empty (§4.3).
    async fn recompute_and_cache(&self, conversation_id: Uuid, client_id: &str) -> CoreResult<()> {
        let system_caller = CallerIdentity::Agent {
            client_id: client_id.to_string(),
        };
        let (entries, _) = self
            .get_entries(
                &system_caller,
                GetEntriesParams {
                    conversation_id,
                    after_entry_id: None,
                    limit: u32::MAX,
                    channel: Some(Channel::Memory),
                    epoch_filter: EpochFilter::Latest,
                    client_id: Some(client_id.to_string()),
                    all_forks: false,
                },
            )
            .await?;
        let epoch = entries.first().and_then(|e| e.epoch);
        self.memory_cache
            .put(conversation_id, client_id, CachedAgentEntries { entries, epoch })
            .await;
        Ok(())
    }

    // ── SyncAgentEntry (§4.2.4) ──────────────────────────────────────────

    pub async fn sync_agent_entry(
        &self,
        caller: &CallerIdentity,
        request: AppendEntriesRequest,
        client_id: &str,
    ) -> CoreResult<SyncResult> {
        if request.entries.len() != 1 || request.entries[0].channel != Channel::Memory {
            return Err(CoreError::validation(
                "entries",
                "SyncAgentEntry takes exactly one MEMORY entry",
            ));
        }
        let incoming_entry = &request.entries[0];
        let incoming_items = memory_items::parse(&incoming_entry.content)?;

        let (conversation, created) = self.resolve_or_create_conversation(caller, &request).await?;
        if !created {
            self.require_caller_access(caller, conversation.group_id, AccessLevel::Writer)
                .await?;
        }

        let cached = self.memory_cache.get(conversation.id, client_id).await;
        let (existing_entries, latest_epoch) = match cached {
            Some(cached) => (cached.entries, cached.epoch),
            None => {
                let (entries, _) = self
                    .get_entries(
                        caller,
                        GetEntriesParams {
                            conversation_id: conversation.id,
                            after_entry_id: None,
                            limit: u32::MAX,
                            channel: Some(Channel::Memory),
                            epoch_filter: EpochFilter::Latest,
                            client_id: Some(client_id.to_string()),
                            all_forks: false,
                        },
                    )
                    .await?;
                let epoch = entries.first().and_then(|e| e.epoch);
                (entries, epoch)
            }
        };

        let mut existing_items = Vec::new();
        for entry in &existing_entries {
            existing_items.extend(memory_items::parse(&entry.content)?);
        }

        let decision = decide_sync(&existing_items, &incoming_items, latest_epoch);

        let result = match decision {
            SyncDecision::NoOp => SyncResult {
                no_op: true,
                epoch: latest_epoch.unwrap_or(0),
                epoch_incremented: false,
                entry: None,
            },
            SyncDecision::Write { content_items, epoch, incremented } => {
                let content = memory_items::encode(&content_items);
                let ciphertext = self.encryption.encrypt(content.as_bytes())?;
                let row = self
                    .db
                    .entries()
                    .insert(NewEntry {
                        id: Uuid::new_v4(),
                        conversation_id: conversation.id,
                        group_id: conversation.group_id,
                        user_id: incoming_entry.user_id,
                        client_id: Some(client_id.to_string()),
                        channel: Channel::Memory,
                        epoch: Some(epoch),
                        content_type: incoming_entry.content_type.clone(),
                        content_ciphertext: ciphertext,
                        indexed_content: None,
                    })
                    .await?;
                let entry = self.decrypt_row(&row).await?;
                self.recompute_and_cache(conversation.id, client_id).await?;
                SyncResult {
                    no_op: false,
                    epoch,
                    epoch_incremented: incremented,
                    entry: Some(entry),
                }
            }
        };

        metrics::record_sync_decision(match (&result.no_op, &result.epoch_incremented) {
            (true, _) => "no_op",
            (false, true) if created => "append_full_create",
            (false, true) => "append_full",
            (false, false) => "append_delta",
        });

        Ok(result)
    }
}

fn validate_append_entry(entry: &AppendEntry) -> CoreResult<()> {
    match entry.channel {
        Channel::History if entry.epoch.is_some() => Err(CoreError::validation(
            "epoch",
            "HISTORY entries must not carry an epoch",
        )),
        Channel::Memory if entry.client_id.as_deref().unwrap_or("").is_empty() => Err(
            CoreError::validation("client_id", "MEMORY entries require a non-empty client_id"),
        ),
        _ => Ok(()),
    }
}

/// Infers a conversation title from the first HISTORY entry's first text
/// block, truncated to 40 characters (§4.2.3).
fn infer_title(entries: &[AppendEntry]) -> Option<String> {
    let first_history = entries.iter().find(|e| e.channel == Channel::History)?;
    let items = memory_items::parse(&first_history.content).ok()?;
    let hint = memory_items::first_text_hint(&items)?;
    Some(hint.chars().take(TITLE_MAX_LEN).collect())
}

/// Ancestor-cursor walk of §4.2.2: admits entries belonging to the
/// current ancestor, advancing to the next ancestor once the walk crosses
/// that ancestor's (child-derived) `stop_at_entry_id`.
fn filter_by_ancestry<'a>(
    entries: &'a [EncryptedEntryRow],
    ancestry: &[crate::models::entry::AncestryNode],
) -> Vec<&'a EncryptedEntryRow> {
    let mut admitted = Vec::new();
    let mut ancestor_idx = 0usize;

    for entry in entries {
        if ancestor_idx >= ancestry.len() {
            break;
        }
        let ancestor = &ancestry[ancestor_idx];
        if entry.conversation_id != ancestor.conversation_id {
            continue;
        }

        admitted.push(entry);

        let is_target = ancestor_idx == ancestry.len() - 1;
        if !is_target
            && let Some(stop_at) = ancestor.stop_at_entry_id
            && entry.id == stop_at
        {
            ancestor_idx += 1;
        }
    }

    admitted
}

/// Applies channel filtering and, for MEMORY, the epoch-filter rule
/// (§4.2.2) — including the cache-accelerated "latest" supersession walk.
fn apply_channel_and_epoch<'a>(
    entries: Vec<&'a EncryptedEntryRow>,
    channel: Option<Channel>,
    epoch_filter: EpochFilter,
    client_id: Option<&str>,
) -> Vec<&'a EncryptedEntryRow> {
    match channel {
        None | Some(Channel::History) => entries
            .into_iter()
            .filter(|e| channel.is_none_or(|c| e.channel == c))
            .collect(),
        Some(Channel::Memory) => {
            let memory_entries = entries.into_iter().filter(|e| e.channel == Channel::Memory);
            match epoch_filter {
                EpochFilter::All => memory_entries
                    .filter(|e| client_id.is_none_or(|cid| e.client_id.as_deref() == Some(cid)))
                    .collect(),
                EpochFilter::Specific(n) => memory_entries
                    .filter(|e| {
                        client_id.is_none_or(|cid| e.client_id.as_deref() == Some(cid)) && e.epoch == Some(n)
                    })
                    .collect(),
                EpochFilter::Latest => {
                    let mut result: Vec<&EncryptedEntryRow> = Vec::new();
                    let mut max_epoch: i64 = i64::MIN;
                    for entry in memory_entries {
                        if client_id.is_some_and(|cid| entry.client_id.as_deref() != Some(cid)) {
                            continue;
                        }
                        let Some(epoch) = entry.epoch else { continue };
                        if epoch > max_epoch {
                            result.clear();
                            max_epoch = epoch;
                            result.push(entry);
                        } else if epoch == max_epoch {
                            result.push(entry);
                        }
                    }
                    result
                }
            }
        }
    }
}

/// Slices the filtered sequence after `after_entry_id` (if present), up
/// to `limit` items, returning the page and the cursor for the next one
/// (the id of the last returned entry, iff more entries follow).
fn paginate<'a>(
    entries: Vec<&'a EncryptedEntryRow>,
    after_entry_id: Option<Uuid>,
    limit: u32,
) -> (Vec<&'a EncryptedEntryRow>, Option<Uuid>) {
    let start = match after_entry_id {
        Some(id) => entries.iter().position(|e| e.id == id).map(|idx| idx + 1).unwrap_or(0),
        None => 0,
    };
    let remaining = &entries[start.min(entries.len())..];
    let limit = limit as usize;
    let page: Vec<&EncryptedEntryRow> = remaining.iter().take(limit).copied().collect();
    let next_cursor = if remaining.len() > limit {
        page.last().map(|e| e.id)
    } else {
        None
    };
    (page, next_cursor)
}

enum SyncDecision {
    NoOp,
    Write {
        content_items: Vec<serde_json::Value>,
        epoch: i64,
        incremented: bool,
    },
}

/// The three-way decision table of §4.2.4.
fn decide_sync(
    existing: &[serde_json::Value],
    incoming: &[serde_json::Value],
    latest_epoch: Option<i64>,
) -> SyncDecision {
    if existing == incoming {
        return SyncDecision::NoOp;
    }

    if incoming.is_empty() {
        // existing is non-empty (handled the equal-and-both-empty case above)
        return SyncDecision::Write {
            content_items: Vec::new(),
            epoch: latest_epoch.unwrap_or(0) + 1,
            incremented: true,
        };
    }

    if memory_items::is_strict_prefix(existing, incoming) {
        return SyncDecision::Write {
            content_items: incoming[existing.len()..].to_vec(),
            epoch: latest_epoch.unwrap_or(1),
            incremented: false,
        };
    }

    SyncDecision::Write {
        content_items: incoming.to_vec(),
        epoch: latest_epoch.unwrap_or(0) + 1,
        incremented: true,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::models::entry::AncestryNode;

    fn row(id: Uuid, conversation_id: Uuid, channel: Channel, epoch: Option<i64>, client_id: Option<&str>) -> EncryptedEntryRow {
        EncryptedEntryRow {
            id,
            conversation_id,
            group_id: Uuid::new_v4(),
            user_id: None,
            client_id: client_id.map(str::to_string),
            channel,
            epoch,
            content_type: "application/json".to_string(),
            content_ciphertext: Vec::new(),
            indexed_content: None,
            indexed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn ancestry_filter_crosses_fork_point_inclusively() {
        let root = Uuid::new_v4();
        let fork = Uuid::new_v4();
        let e1 = row(Uuid::new_v4(), root, Channel::History, None, None);
        let fence = row(Uuid::new_v4(), root, Channel::History, None, None);
        let e_after_fence = row(Uuid::new_v4(), root, Channel::History, None, None);
        let e_in_fork = row(Uuid::new_v4(), fork, Channel::History, None, None);

        let ancestry = vec![
            AncestryNode {
                conversation_id: root,
                stop_at_entry_id: Some(fence.id),
            },
            AncestryNode {
                conversation_id: fork,
                stop_at_entry_id: None,
            },
        ];

        let entries = vec![e1.clone(), fence.clone(), e_after_fence.clone(), e_in_fork.clone()];
        let filtered = filter_by_ancestry(&entries, &ancestry);
        let ids: Vec<Uuid> = filtered.iter().map(|e| e.id).collect();

        // Inclusive on the parent side: e1 and fence are admitted; the
        // root entry created after the fence is not, since ancestry
        // already advanced past root once fence was crossed.
        assert_eq!(ids, vec![e1.id, fence.id, e_in_fork.id]);
        assert!(!ids.contains(&e_after_fence.id));
    }

    #[test]
    fn latest_epoch_supersedes_all_earlier_epochs() {
        let conversation_id = Uuid::new_v4();
        let e1 = row(Uuid::new_v4(), conversation_id, Channel::Memory, Some(1), Some("agent-a"));
        let e2 = row(Uuid::new_v4(), conversation_id, Channel::Memory, Some(2), Some("agent-a"));
        let e3 = row(Uuid::new_v4(), conversation_id, Channel::Memory, Some(2), Some("agent-a"));
        let other_client = row(Uuid::new_v4(), conversation_id, Channel::Memory, Some(5), Some("agent-b"));

        let entries = vec![e1.clone(), e2.clone(), e3.clone(), other_client.clone()];
        let refs: Vec<&EncryptedEntryRow> = entries.iter().collect();
        let filtered = apply_channel_and_epoch(refs, Some(Channel::Memory), EpochFilter::Latest, Some("agent-a"));

        let ids: Vec<Uuid> = filtered.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![e2.id, e3.id]);
    }

    #[test]
    fn pagination_cursor_points_at_last_returned_entry_when_more_follow() {
        let conversation_id = Uuid::new_v4();
        let rows: Vec<EncryptedEntryRow> = (0..5)
            .map(|_| row(Uuid::new_v4(), conversation_id, Channel::History, None, None))
            .collect();
        let refs: Vec<&EncryptedEntryRow> = rows.iter().collect();

        let (page, cursor) = paginate(refs, None, 2);
        assert_eq!(page.len(), 2);
        assert_eq!(cursor, Some(page[1].id));

        let refs2: Vec<&EncryptedEntryRow> = rows.iter().collect();
        let (last_page, last_cursor) = paginate(refs2, Some(rows[3].id), 2);
        assert_eq!(last_page.len(), 1);
        assert_eq!(last_cursor, None);
    }

    #[test]
    fn sync_decision_no_op_on_deep_equal() {
        let existing = vec![json!("a"), json!("b")];
        let incoming = vec![json!("a"), json!("b")];
        assert!(matches!(decide_sync(&existing, &incoming, Some(3)), SyncDecision::NoOp));
    }

    #[test]
    fn sync_decision_no_op_on_both_empty() {
        assert!(matches!(decide_sync(&[], &[], None), SyncDecision::NoOp));
    }

    #[test]
    fn sync_decision_strict_prefix_appends_delta_same_epoch() {
        let existing = vec![json!("a")];
        let incoming = vec![json!("a"), json!("b")];
        match decide_sync(&existing, &incoming, Some(3)) {
            SyncDecision::Write { content_items, epoch, incremented } => {
                assert_eq!(content_items, vec![json!("b")]);
                assert_eq!(epoch, 3);
                assert!(!incremented);
            }
            _ => panic!("expected a write"),
        }
    }

    #[test]
    fn sync_decision_divergence_appends_full_next_epoch() {
        let existing = vec![json!("a"), json!("x")];
        let incoming = vec![json!("a"), json!("y")];
        match decide_sync(&existing, &incoming, Some(3)) {
            SyncDecision::Write { content_items, epoch, incremented } => {
                assert_eq!(content_items, incoming);
                assert_eq!(epoch, 4);
                assert!(incremented);
            }
            _ => panic!("expected a write"),
        }
    }

    #[test]
    fn sync_decision_empty_incoming_with_existing_increments_epoch_with_empty_content() {
        let existing = vec![json!("a")];
        match decide_sync(&existing, &[], Some(3)) {
            SyncDecision::Write { content_items, epoch, incremented } => {
                assert!(content_items.is_empty());
                assert_eq!(epoch, 4);
                assert!(incremented);
            }
            _ => panic!("expected a write"),
        }
    }

    #[test]
    fn sync_decision_first_write_on_auto_create_is_epoch_one() {
        let incoming = vec![json!("a")];
        match decide_sync(&[], &incoming, None) {
            SyncDecision::Write { epoch, incremented, .. } => {
                assert_eq!(epoch, 1);
                assert!(incremented);
            }
            _ => panic!("expected a write"),
        }
    }
}
