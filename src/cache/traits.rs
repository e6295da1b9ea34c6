use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheResult;

/// Generic byte-oriented cache abstraction. Backs both the Memory-Entries
/// Cache and the Response Resumer's locator; neither depends on it for
/// correctness (§4.3, §6.4) so every method here must degrade to `Ok` on
/// a miss rather than force callers to distinguish "absent" from "down".
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get raw bytes from cache.
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Set raw bytes in cache with TTL. A zero TTL means no expiry.
    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Set raw bytes only if key doesn't exist (atomic set-if-not-exists).
    /// Returns true if the value was set, false if key already exists.
    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool>;

    /// Delete a value from cache.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Increment a counter by delta, returning the new value. Used for the
    /// cache hit/miss counters in §4.3.
    async fn incr_by(&self, key: &str, delta: i64, ttl: Duration) -> CacheResult<i64>;

    /// Reference to the underlying Redis client, when this is a
    /// Redis-backed cache. Used by the Response Resumer locator, which
    /// needs a real TTL refresh rather than re-`set_bytes` (§4.4.2).
    #[cfg(feature = "redis-backend")]
    fn as_redis(&self) -> Option<&super::RedisCache> {
        None
    }
}

/// Helper extension trait for working with JSON.
pub trait CacheExt: Cache {
    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        use super::error::CacheError;
        match self.get_bytes(key).await? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| CacheError::Deserialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set_json<T: serde::Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<()> {
        use super::error::CacheError;
        let bytes =
            serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.set_bytes(key, &bytes, ttl).await
    }
}

impl<T: Cache + ?Sized> CacheExt for T {}
