//! Fork Resolver (§4.2.1): ancestry construction with "fork-point shifting".

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::models::conversation::EncryptedConversationRow;
use crate::models::entry::AncestryNode;

/// Builds the root-first ancestry chain for `target_id`, given every
/// non-deleted conversation in its group.
///
/// `stop_at_entry_id` on a node comes from the CHILD one step closer to
/// the target, not from the node itself: a conversation's own
/// `forked_at_entry_id` describes where it branched FROM its parent, so
/// it is the *parent's* stop point. The target's own node always carries
/// `stop_at_entry_id = None` (include all of its entries).
pub fn build_ancestry(
    conversations: &[EncryptedConversationRow],
    target_id: Uuid,
) -> CoreResult<Vec<AncestryNode>> {
    let by_id: HashMap<Uuid, &EncryptedConversationRow> =
        conversations.iter().map(|c| (c.id, c)).collect();

    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut current_id = target_id;
    let mut stop_at_entry_id: Option<Uuid> = None;

    loop {
        if !visited.insert(current_id) {
            return Err(CoreError::Internal(format!(
                "cycle detected in fork ancestry at conversation {current_id}"
            )));
        }

        let current = by_id
            .get(&current_id)
            .ok_or_else(|| CoreError::not_found("conversation", current_id))?;

        chain.push(AncestryNode {
            conversation_id: current_id,
            stop_at_entry_id,
        });

        match current.forked_at_conversation_id {
            Some(parent_id) if by_id.contains_key(&parent_id) => {
                stop_at_entry_id = current.forked_at_entry_id;
                current_id = parent_id;
            }
            _ => break,
        }
    }

    chain.reverse();
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn conv(id: Uuid, group_id: Uuid, parent: Option<Uuid>, stop_at: Option<Uuid>) -> EncryptedConversationRow {
        EncryptedConversationRow {
            id,
            group_id,
            owner_user_id: Uuid::new_v4(),
            title_ciphertext: Vec::new(),
            metadata: Default::default(),
            forked_at_conversation_id: parent,
            forked_at_entry_id: stop_at,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn root_conversation_has_single_node_with_no_stop() {
        let group_id = Uuid::new_v4();
        let root = conv(group_id, group_id, None, None);
        let chain = build_ancestry(&[root.clone()], group_id).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].conversation_id, group_id);
        assert!(chain[0].stop_at_entry_id.is_none());
    }

    #[test]
    fn fork_shifts_stop_point_to_parent_node() {
        let group_id = Uuid::new_v4();
        let fence = Uuid::new_v4();
        let root = conv(group_id, group_id, None, None);
        let fork_id = Uuid::new_v4();
        let fork = conv(fork_id, group_id, Some(group_id), Some(fence));

        let chain = build_ancestry(&[root, fork], fork_id).unwrap();
        assert_eq!(chain.len(), 2);
        // root-first: parent node carries the fork's stop point...
        assert_eq!(chain[0].conversation_id, group_id);
        assert_eq!(chain[0].stop_at_entry_id, Some(fence));
        // ...and the target's own node has none.
        assert_eq!(chain[1].conversation_id, fork_id);
        assert!(chain[1].stop_at_entry_id.is_none());
    }

    #[test]
    fn dangling_parent_reference_stops_the_walk() {
        // A parent outside the loaded (non-deleted) group set is treated
        // like "no parent" rather than an error (§4.2.1 step 2).
        let group_id = Uuid::new_v4();
        let missing_parent = Uuid::new_v4();
        let fork_id = Uuid::new_v4();
        let fork = conv(fork_id, group_id, Some(missing_parent), Some(Uuid::new_v4()));

        let chain = build_ancestry(&[fork], fork_id).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].conversation_id, fork_id);
        assert!(chain[0].stop_at_entry_id.is_none());
    }

    #[test]
    fn target_missing_from_group_is_not_found() {
        let group_id = Uuid::new_v4();
        let root = conv(group_id, group_id, None, None);
        let err = build_ancestry(&[root], Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
