use std::{
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{error::CacheResult, traits::Cache};
use crate::config::MemoryCacheConfig;

struct CacheEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
    last_accessed: Instant,
}

impl CacheEntry {
    fn new(data: Vec<u8>, expires_at: Option<Instant>) -> Self {
        Self {
            data,
            expires_at,
            last_accessed: Instant::now(),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

/// In-memory cache implementation using DashMap for concurrent access.
///
/// Each instance maintains its own independent cache: the Memory-Entries
/// Cache tolerates this (storage remains authoritative, §4.3); the
/// Response Resumer's locator does not, so multi-instance deployments
/// must use [`super::RedisCache`] for the locator instead (§4.4.2).
pub struct MemoryCache {
    data: Arc<DashMap<String, CacheEntry>>,
    counters: Arc<DashMap<String, Arc<AtomicI64>>>,
    max_entries: usize,
    eviction_batch_size: usize,
}

impl MemoryCache {
    pub fn new(config: &MemoryCacheConfig) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            counters: Arc::new(DashMap::new()),
            max_entries: config.max_entries,
            eviction_batch_size: config.eviction_batch_size.max(1),
        }
    }

    fn evict_if_needed(&self) {
        if self.data.len() < self.max_entries {
            return;
        }

        // First pass: remove all expired entries.
        self.data.retain(|_, entry| !entry.is_expired());

        let current_len = self.data.len();
        if current_len < self.max_entries {
            return;
        }

        let target_size = self.max_entries.saturating_sub(self.eviction_batch_size);
        let to_evict = current_len.saturating_sub(target_size);
        if to_evict == 0 {
            return;
        }

        let mut entries: Vec<_> = self
            .data
            .iter()
            .map(|entry| (entry.key().clone(), entry.last_accessed))
            .collect();
        entries.sort_by_key(|(_, last_accessed)| *last_accessed);

        for (key, _) in entries.into_iter().take(to_evict) {
            self.data.remove(&key);
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        if let Some(mut entry) = self.data.get_mut(key) {
            if entry.is_expired() {
                drop(entry);
                self.data.remove(key);
                return Ok(None);
            }
            entry.touch();
            Ok(Some(entry.data.clone()))
        } else {
            Ok(None)
        }
    }

    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.evict_if_needed();

        let expires_at = if !ttl.is_zero() {
            Some(Instant::now() + ttl)
        } else {
            None
        };

        self.data
            .insert(key.to_string(), CacheEntry::new(value.to_vec(), expires_at));

        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        self.evict_if_needed();

        let expires_at = if !ttl.is_zero() {
            Some(Instant::now() + ttl)
        } else {
            None
        };

        use dashmap::mapref::entry::Entry;
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut e) => {
                if e.get().is_expired() {
                    e.insert(CacheEntry::new(value.to_vec(), expires_at));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(e) => {
                e.insert(CacheEntry::new(value.to_vec(), expires_at));
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.data.remove(key);
        self.counters.remove(key);
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64, _ttl: Duration) -> CacheResult<i64> {
        let counter = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AtomicI64::new(0)))
            .clone();

        Ok(counter.fetch_add(delta, Ordering::SeqCst) + delta)
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;

    fn test_config(max_entries: usize) -> MemoryCacheConfig {
        MemoryCacheConfig {
            max_entries,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_set_bytes() {
        let cache = MemoryCache::new(&test_config(100));

        cache
            .set_bytes("key1", b"value1", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            cache.get_bytes("key1").await.unwrap(),
            Some(b"value1".to_vec())
        );
        assert_eq!(cache.get_bytes("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new(&test_config(100));

        cache
            .set_bytes("key1", b"value1", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.get_bytes("key1").await.unwrap().is_some());

        cache.delete("key1").await.unwrap();
        assert!(cache.get_bytes("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = MemoryCache::new(&test_config(100));

        cache
            .set_bytes("expiring", b"value", Duration::from_millis(200))
            .await
            .unwrap();
        assert!(cache.get_bytes("expiring").await.unwrap().is_some());

        sleep(Duration::from_millis(300)).await;
        assert!(cache.get_bytes("expiring").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_means_no_expiration() {
        let cache = MemoryCache::new(&test_config(100));

        cache
            .set_bytes("forever", b"value", Duration::from_secs(0))
            .await
            .unwrap();
        assert!(cache.get_bytes("forever").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_set_nx_existing_key() {
        let cache = MemoryCache::new(&test_config(100));

        cache
            .set_bytes("existing_key", b"original", Duration::from_secs(60))
            .await
            .unwrap();

        let result = cache
            .set_nx("existing_key", b"new_value", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(!result);
        assert_eq!(
            cache.get_bytes("existing_key").await.unwrap(),
            Some(b"original".to_vec())
        );
    }

    #[tokio::test]
    async fn test_set_nx_new_key() {
        let cache = MemoryCache::new(&test_config(100));

        assert!(
            cache
                .set_nx("new_key", b"value", Duration::from_secs(60))
                .await
                .unwrap()
        );
        assert_eq!(
            cache.get_bytes("new_key").await.unwrap(),
            Some(b"value".to_vec())
        );
    }

    #[tokio::test]
    async fn test_incr_by() {
        let cache = MemoryCache::new(&test_config(100));

        assert_eq!(
            cache
                .incr_by("counter", 5, Duration::from_secs(60))
                .await
                .unwrap(),
            5
        );
        assert_eq!(
            cache
                .incr_by("counter", 10, Duration::from_secs(60))
                .await
                .unwrap(),
            15
        );
    }

    #[tokio::test]
    async fn test_eviction_on_max_entries() {
        let cache = MemoryCache::new(&test_config(3));

        cache
            .set_bytes("old1", b"v", Duration::from_millis(100))
            .await
            .unwrap();
        cache
            .set_bytes("old2", b"v", Duration::from_millis(100))
            .await
            .unwrap();
        cache
            .set_bytes("old3", b"v", Duration::from_millis(100))
            .await
            .unwrap();

        sleep(Duration::from_millis(200)).await;

        cache
            .set_bytes("new", b"value", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.get_bytes("new").await.unwrap().is_some());
    }
}
