use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    error::CacheResult,
    traits::{Cache, CacheExt},
};

/// Where a conversation's in-flight response recording lives (§4.4.2,
/// §6.4). Any instance can look this up to decide whether to record
/// locally or redirect a replay request to the owning instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingLocator {
    pub advertised_host: String,
    pub advertised_port: u16,
    pub spool_name: String,
}

fn locator_key(conversation_id: Uuid) -> String {
    format!("response:{conversation_id}")
}

/// Cross-instance registry of who owns the open recording for a
/// conversation. Backed by [`Cache`]; when the cache is unavailable a
/// lookup simply misses and the caller treats the conversation as
/// unrecorded (no cross-instance redirect is possible, but nothing in
/// storage is broken).
pub struct ResumerLocator {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl ResumerLocator {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Publish this instance as the owner of `conversation_id`'s recording.
    /// Fails (returns `false`) only if another instance already holds the
    /// key; callers should treat that as "someone else is recording this".
    pub async fn claim(
        &self,
        conversation_id: Uuid,
        locator: &RecordingLocator,
    ) -> CacheResult<bool> {
        let key = locator_key(conversation_id);
        let bytes = serde_json::to_vec(locator)
            .map_err(|e| super::error::CacheError::Serialization(e.to_string()))?;
        self.cache.set_nx(&key, &bytes, self.ttl).await
    }

    pub async fn lookup(&self, conversation_id: Uuid) -> Option<RecordingLocator> {
        let key = locator_key(conversation_id);
        self.cache.get_json::<RecordingLocator>(&key).await.ok().flatten()
    }

    /// Refresh the locator's TTL without touching its value. Called every
    /// `locator_refresh_secs` while a recording is open (§4.4.2).
    pub async fn refresh(&self, conversation_id: Uuid, locator: &RecordingLocator) {
        let key = locator_key(conversation_id);
        #[cfg(feature = "redis-backend")]
        if let Some(redis) = self.cache.as_redis() {
            let _ = redis.expire(&key, self.ttl).await;
            return;
        }
        let _ = self.cache.set_json(&key, locator, self.ttl).await;
    }

    pub async fn release(&self, conversation_id: Uuid) {
        let key = locator_key(conversation_id);
        let _ = self.cache.delete(&key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryCacheConfig;

    fn new_locator() -> ResumerLocator {
        let backend = Arc::new(super::super::memory::MemoryCache::new(&MemoryCacheConfig::default()));
        ResumerLocator::new(backend, Duration::from_secs(10))
    }

    fn sample_locator() -> RecordingLocator {
        RecordingLocator {
            advertised_host: "10.0.0.5".into(),
            advertised_port: 8080,
            spool_name: "abc123.spool".into(),
        }
    }

    #[tokio::test]
    async fn claim_then_lookup_round_trips() {
        let locator = new_locator();
        let conversation_id = Uuid::new_v4();
        assert!(locator.claim(conversation_id, &sample_locator()).await.unwrap());

        let found = locator.lookup(conversation_id).await.unwrap();
        assert_eq!(found.spool_name, "abc123.spool");
    }

    #[tokio::test]
    async fn second_claim_fails_while_first_holds() {
        let locator = new_locator();
        let conversation_id = Uuid::new_v4();
        assert!(locator.claim(conversation_id, &sample_locator()).await.unwrap());

        let other = RecordingLocator {
            advertised_host: "10.0.0.6".into(),
            advertised_port: 8080,
            spool_name: "other.spool".into(),
        };
        assert!(!locator.claim(conversation_id, &other).await.unwrap());
    }

    #[tokio::test]
    async fn release_clears_locator() {
        let locator = new_locator();
        let conversation_id = Uuid::new_v4();
        locator.claim(conversation_id, &sample_locator()).await.unwrap();
        locator.release(conversation_id).await;
        assert!(locator.lookup(conversation_id).await.is_none());
    }

    #[tokio::test]
    async fn lookup_miss_on_unknown_conversation() {
        let locator = new_locator();
        assert!(locator.lookup(Uuid::new_v4()).await.is_none());
    }
}
