use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Cache configuration.
///
/// The cache backs the Memory-Entries Cache (read-through, per
/// `(conversation, clientId)`) and the Response Resumer's recording
/// locator. Both degrade to storage/redirect-failure if the cache is
/// absent or unavailable; neither depends on it for correctness.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum CacheConfig {
    /// No caching. Rate limiting and budget enforcement are disabled.
    /// Only suitable for local development.
    #[default]
    None,

    /// In-memory cache. Good for single-node deployments.
    /// Data is lost on restart. Not suitable for multi-node.
    Memory(MemoryCacheConfig),

    /// Redis cache. Required for multi-node deployments.
    Redis(RedisCacheConfig),
}

impl CacheConfig {
    pub fn is_none(&self) -> bool {
        matches!(self, CacheConfig::None)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            CacheConfig::None => Ok(()),
            CacheConfig::Memory(c) => c.validate(),
            CacheConfig::Redis(c) => c.validate(),
        }
    }

    /// Get TTL configuration, using defaults if cache is not configured.
    pub fn ttl(&self) -> CacheTtlConfig {
        match self {
            CacheConfig::None => CacheTtlConfig::default(),
            CacheConfig::Memory(c) => c.ttl.clone(),
            CacheConfig::Redis(c) => c.ttl.clone(),
        }
    }
}

/// In-memory cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries in the cache.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Number of entries to evict when cache is full.
    /// Eviction removes expired entries first, then uses LRU.
    #[serde(default = "default_eviction_batch_size")]
    pub eviction_batch_size: usize,

    /// Default TTL for cache entries in seconds.
    #[serde(default = "default_ttl")]
    pub default_ttl_secs: u64,

    /// TTL settings for specific cache types.
    #[serde(default)]
    pub ttl: CacheTtlConfig,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            eviction_batch_size: default_eviction_batch_size(),
            default_ttl_secs: default_ttl(),
            ttl: CacheTtlConfig::default(),
        }
    }
}

impl MemoryCacheConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::Validation(
                "Memory cache max_entries must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_max_entries() -> usize {
    100_000
}

fn default_eviction_batch_size() -> usize {
    100 // Evict 100 entries at a time when cache is full
}

fn default_ttl() -> u64 {
    3600 // 1 hour
}

/// Redis cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RedisCacheConfig {
    /// Redis connection URL.
    /// Format: redis://[user:password@]host:port[/database]
    /// For clusters: redis+cluster://host1:port1,host2:port2,...
    pub url: String,

    /// Connection timeout in seconds.
    #[serde(default = "default_redis_timeout")]
    pub connect_timeout_secs: u64,

    /// Key prefix for all cache keys.
    /// Useful when sharing a Redis instance with other applications.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Enable TLS for Redis connections.
    #[serde(default)]
    pub tls: bool,

    /// Cluster mode configuration.
    #[serde(default)]
    pub cluster: Option<RedisClusterConfig>,

    /// TTL settings for specific cache types.
    #[serde(default)]
    pub ttl: CacheTtlConfig,
}

impl RedisCacheConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::Validation("Redis URL cannot be empty".into()));
        }
        Ok(())
    }
}

/// Redis cluster configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RedisClusterConfig {
    /// Read from replicas for read operations.
    #[serde(default)]
    pub read_from_replicas: bool,

    /// Number of retries for cluster operations.
    #[serde(default = "default_cluster_retries")]
    pub retries: u32,

    /// Retry delay in milliseconds between retries.
    #[serde(default = "default_cluster_retry_delay")]
    pub retry_delay_ms: u64,

    /// Connection timeout for cluster nodes in seconds.
    #[serde(default = "default_cluster_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Response timeout for cluster operations in seconds.
    #[serde(default = "default_cluster_response_timeout")]
    pub response_timeout_secs: u64,
}

fn default_redis_timeout() -> u64 {
    5
}

fn default_key_prefix() -> String {
    "memoryd:".to_string()
}

fn default_cluster_retries() -> u32 {
    3
}

fn default_cluster_retry_delay() -> u64 {
    100 // 100ms
}

fn default_cluster_connection_timeout() -> u64 {
    5
}

fn default_cluster_response_timeout() -> u64 {
    1
}

/// TTL configuration for different cache types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct CacheTtlConfig {
    /// TTL for the Memory-Entries Cache in seconds. Invalidated/warmed on
    /// every MEMORY append or sync, so this mainly bounds staleness after a
    /// cache write is lost (e.g. instance restart with a remote cache).
    #[serde(default = "default_memory_entries_ttl")]
    pub memory_entries_secs: u64,

    /// TTL for the Response Resumer's `response:{conversationId}` locator,
    /// per §6.4. The owning instance refreshes this every
    /// `locator_refresh_secs` while the recording is open.
    #[serde(default = "default_locator_ttl")]
    pub locator_secs: u64,

    /// How often the owning instance refreshes the locator TTL.
    #[serde(default = "default_locator_refresh")]
    pub locator_refresh_secs: u64,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            memory_entries_secs: default_memory_entries_ttl(),
            locator_secs: default_locator_ttl(),
            locator_refresh_secs: default_locator_refresh(),
        }
    }
}

fn default_memory_entries_ttl() -> u64 {
    3600 // 1 hour
}

fn default_locator_ttl() -> u64 {
    10 // §6.4: 10s TTL
}

fn default_locator_refresh() -> u64 {
    5 // §4.4.2: refreshed every 5s
}
