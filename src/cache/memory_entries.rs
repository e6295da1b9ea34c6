use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    error::CacheResult,
    traits::{Cache, CacheExt},
};
use crate::models::entry::Entry;

/// Cached view of a single agent's MEMORY entries for one conversation,
/// keyed by `(conversation_id, client_id)` (§4.3). Storage remains
/// authoritative; a miss or eviction here never changes the result of a
/// read, only its latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAgentEntries {
    pub entries: Vec<Entry>,
    pub epoch: Option<i64>,
}

fn cache_key(conversation_id: Uuid, client_id: &str) -> String {
    format!("memory-entries:{conversation_id}:{client_id}")
}

fn counter_key(suffix: &str) -> String {
    format!("memory-entries:counters:{suffix}")
}

/// Read-through cache wrapping a generic byte-oriented [`Cache`].
///
/// `get` and `put` never return an error to the caller: a cache
/// unavailability is logged by the underlying [`Cache`] implementation and
/// surfaces here as a plain miss, so the engine always falls back to
/// storage on any hiccup.
pub struct MemoryEntriesCache {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl MemoryEntriesCache {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub async fn get(&self, conversation_id: Uuid, client_id: &str) -> Option<CachedAgentEntries> {
        let key = cache_key(conversation_id, client_id);
        match self.cache.get_json::<CachedAgentEntries>(&key).await {
            Ok(Some(cached)) => {
                let _ = self.cache.incr_by(&counter_key("hits"), 1, Duration::ZERO).await;
                Some(cached)
            }
            Ok(None) => {
                let _ = self.cache.incr_by(&counter_key("misses"), 1, Duration::ZERO).await;
                None
            }
            Err(_) => {
                let _ = self.cache.incr_by(&counter_key("misses"), 1, Duration::ZERO).await;
                None
            }
        }
    }

    /// Populate the cache for `(conversation_id, client_id)`. Per §4.3, a
    /// recomputation that yields zero entries clears any cached value
    /// rather than caching an empty result, so a later append is picked up
    /// immediately instead of waiting out the TTL.
    pub async fn put(&self, conversation_id: Uuid, client_id: &str, value: CachedAgentEntries) {
        let key = cache_key(conversation_id, client_id);
        if value.entries.is_empty() {
            let _ = self.cache.delete(&key).await;
            return;
        }
        let _ = self.cache.set_json(&key, &value, self.ttl).await;
    }

    pub async fn invalidate(&self, conversation_id: Uuid, client_id: &str) {
        let key = cache_key(conversation_id, client_id);
        let _ = self.cache.delete(&key).await;
    }

    pub async fn hit_count(&self) -> CacheResult<i64> {
        self.cache.incr_by(&counter_key("hits"), 0, Duration::ZERO).await
    }

    pub async fn miss_count(&self) -> CacheResult<i64> {
        self.cache.incr_by(&counter_key("misses"), 0, Duration::ZERO).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryCacheConfig;

    fn new_cache() -> MemoryEntriesCache {
        let backend = Arc::new(super::super::memory::MemoryCache::new(&MemoryCacheConfig::default()));
        MemoryEntriesCache::new(backend, Duration::from_secs(60))
    }

    fn sample_entry(client_id: &str) -> Entry {
        Entry {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            user_id: None,
            client_id: Some(client_id.to_string()),
            channel: crate::models::entry::Channel::Memory,
            epoch: Some(1),
            content_type: "application/json".into(),
            content: "[]".into(),
            indexed_content: None,
            indexed_at: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn miss_on_empty_cache() {
        let cache = new_cache();
        assert!(cache.get(Uuid::new_v4(), "agent-1").await.is_none());
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = new_cache();
        let conversation_id = Uuid::new_v4();
        let value = CachedAgentEntries {
            entries: vec![sample_entry("agent-1")],
            epoch: Some(1),
        };
        cache.put(conversation_id, "agent-1", value.clone()).await;
        let got = cache.get(conversation_id, "agent-1").await.unwrap();
        assert_eq!(got.entries.len(), 1);
        assert_eq!(got.epoch, Some(1));
    }

    #[tokio::test]
    async fn empty_result_clears_cached_entry() {
        let cache = new_cache();
        let conversation_id = Uuid::new_v4();
        cache
            .put(
                conversation_id,
                "agent-1",
                CachedAgentEntries {
                    entries: vec![sample_entry("agent-1")],
                    epoch: Some(1),
                },
            )
            .await;
        assert!(cache.get(conversation_id, "agent-1").await.is_some());

        cache
            .put(
                conversation_id,
                "agent-1",
                CachedAgentEntries {
                    entries: vec![],
                    epoch: None,
                },
            )
            .await;
        assert!(cache.get(conversation_id, "agent-1").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = new_cache();
        let conversation_id = Uuid::new_v4();
        cache
            .put(
                conversation_id,
                "agent-1",
                CachedAgentEntries {
                    entries: vec![sample_entry("agent-1")],
                    epoch: Some(1),
                },
            )
            .await;
        cache.invalidate(conversation_id, "agent-1").await;
        assert!(cache.get(conversation_id, "agent-1").await.is_none());
    }
}
