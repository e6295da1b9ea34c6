use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// HISTORY is the user-visible transcript; MEMORY is per-agent working
/// memory versioned by epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    History,
    Memory,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::History => "HISTORY",
            Channel::Memory => "MEMORY",
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HISTORY" => Ok(Channel::History),
            "MEMORY" => Ok(Channel::Memory),
            _ => Err(format!("invalid channel: {s}")),
        }
    }
}

/// The atomic unit of stored content. Entries are never individually
/// deleted; they are hard-deleted only when their group is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct Entry {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub group_id: Uuid,
    pub user_id: Option<Uuid>,
    pub client_id: Option<String>,
    pub channel: Channel,
    /// Required iff `channel == Memory`.
    pub epoch: Option<i64>,
    pub content_type: String,
    pub content: String,
    pub indexed_content: Option<String>,
    pub indexed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A row as stored before decryption; `content` travels as the envelope
/// bytes described by the encryption module. The engine is the only
/// caller that constructs an [`Entry`] from one of these, via
/// `EnvelopeService::decrypt`.
#[derive(Debug, Clone)]
pub struct EncryptedEntryRow {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub group_id: Uuid,
    pub user_id: Option<Uuid>,
    pub client_id: Option<String>,
    pub channel: Channel,
    pub epoch: Option<i64>,
    pub content_type: String,
    pub content_ciphertext: Vec<u8>,
    pub indexed_content: Option<String>,
    pub indexed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// HISTORY entries have epoch unset; MEMORY entries must carry epoch >= 1
    /// and a non-empty client_id.
    pub fn validate_channel_invariant(&self) -> Result<(), String> {
        match self.channel {
            Channel::History => {
                if self.epoch.is_some() {
                    return Err("HISTORY entries must not carry an epoch".into());
                }
            }
            Channel::Memory => {
                match self.epoch {
                    Some(e) if e >= 1 => {}
                    _ => return Err("MEMORY entries require epoch >= 1".into()),
                }
                if self.client_id.as_deref().unwrap_or("").is_empty() {
                    return Err("MEMORY entries require a non-empty client_id".into());
                }
            }
        }
        Ok(())
    }
}

/// Total order within a group: `(created_at, id)`, ties on `created_at`
/// broken by `id`.
pub fn entry_order_key(entry: &Entry) -> (DateTime<Utc>, Uuid) {
    (entry.created_at, entry.id)
}

/// `epochFilter` on `GetEntries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochFilter {
    Latest,
    All,
    Specific(i64),
}

impl Default for EpochFilter {
    fn default() -> Self {
        EpochFilter::Latest
    }
}

#[derive(Debug, Clone)]
pub struct GetEntriesParams {
    pub conversation_id: Uuid,
    pub after_entry_id: Option<Uuid>,
    pub limit: u32,
    pub channel: Option<Channel>,
    pub epoch_filter: EpochFilter,
    pub client_id: Option<String>,
    pub all_forks: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct AppendEntry {
    pub channel: Channel,
    pub epoch: Option<i64>,
    pub user_id: Option<Uuid>,
    pub client_id: Option<String>,
    pub content_type: String,
    pub content: String,
    pub indexed_content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct AppendEntriesRequest {
    pub conversation_id: Option<Uuid>,
    pub forked_from: Option<crate::models::conversation::ForkSpec>,
    pub entries: Vec<AppendEntry>,
}

/// Outcome of the three-way sync decision between existing and incoming
/// memory content — see the engine for the branch table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct SyncResult {
    pub no_op: bool,
    pub epoch: i64,
    pub epoch_incremented: bool,
    pub entry: Option<Entry>,
}

/// One item in the ancestry chain built by `build_ancestry`: a conversation
/// and the entry (from its child) after which its visibility stops.
#[derive(Debug, Clone, Copy)]
pub struct AncestryNode {
    pub conversation_id: Uuid,
    pub stop_at_entry_id: Option<Uuid>,
}
