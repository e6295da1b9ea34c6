use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::error::DbResult;
use crate::models::entry::{Channel, EncryptedEntryRow};

#[derive(Debug, Clone)]
pub struct NewEntry {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub group_id: Uuid,
    pub user_id: Option<Uuid>,
    pub client_id: Option<String>,
    pub channel: Channel,
    pub epoch: Option<i64>,
    pub content_type: String,
    /// Ciphertext; the engine owns encryption.
    pub content_ciphertext: Vec<u8>,
    pub indexed_content: Option<String>,
}

#[async_trait]
pub trait EntryRepo: Send + Sync {
    async fn insert(&self, entry: NewEntry) -> DbResult<EncryptedEntryRow>;

    async fn insert_batch(&self, entries: Vec<NewEntry>) -> DbResult<Vec<EncryptedEntryRow>>;

    /// Every entry in the group, ordered by `(created_at, id)`. This is the
    /// primary access path for ancestry-aware retrieval: callers filter the
    /// in-memory stream rather than pushing fork logic into SQL.
    async fn list_by_group_ordered(&self, group_id: Uuid) -> DbResult<Vec<EncryptedEntryRow>>;

    async fn get_by_id(&self, id: Uuid, group_id: Uuid) -> DbResult<Option<EncryptedEntryRow>>;

    /// HISTORY entries in the group with no `indexed_content` set yet.
    async fn list_unindexed(&self, group_id: Uuid, limit: u32) -> DbResult<Vec<EncryptedEntryRow>>;

    /// Entries across all groups whose `indexed_content` is set but
    /// `indexed_at` is not, oldest first, for the vector-indexing worker.
    async fn find_pending_vector_indexing(&self, limit: u32) -> DbResult<Vec<EncryptedEntryRow>>;

    async fn set_indexed_content(
        &self,
        entry_id: Uuid,
        group_id: Uuid,
        indexed_content: String,
    ) -> DbResult<()>;

    async fn set_indexed_at(
        &self,
        entry_id: Uuid,
        group_id: Uuid,
        ts: DateTime<Utc>,
    ) -> DbResult<()>;
}
