use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

/// A node in a fork tree. Titles are opaque encrypted bytes at rest; callers
/// only ever see the decrypted `title` field on this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct Conversation {
    pub id: Uuid,
    pub group_id: Uuid,
    pub owner_user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub forked_at_conversation_id: Option<Uuid>,
    pub forked_at_entry_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn is_root(&self) -> bool {
        self.forked_at_conversation_id.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A row as stored before decryption; `title` and any encrypted metadata
/// fields travel as the envelope bytes described by the encryption module.
#[derive(Debug, Clone)]
pub struct EncryptedConversationRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub owner_user_id: Uuid,
    pub title_ciphertext: Vec<u8>,
    pub metadata: HashMap<String, Value>,
    pub forked_at_conversation_id: Option<Uuid>,
    pub forked_at_entry_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct CreateConversation {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub forked_from: Option<ForkSpec>,
}

/// Fork request: the parent conversation and the entry after which the
/// new conversation should branch.
#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ForkSpec {
    pub parent_conversation_id: Uuid,
    pub at_entry_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct UpdateConversation {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub metadata: Option<HashMap<String, Value>>,
}

/// `ListConversations` mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum ListConversationsMode {
    All,
    Roots,
    LatestFork,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ListConversationsParams {
    pub mode: ListConversationsMode,
    pub text_query: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}
