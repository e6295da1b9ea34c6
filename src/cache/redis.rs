use std::time::Duration;

use async_trait::async_trait;
use redis::{ConnectionInfo, IntoConnectionInfo, cluster::ClusterClient, cluster_async::ClusterConnection};

use super::{error::CacheResult, traits::Cache};
use crate::config::RedisCacheConfig;

/// A wrapper enum for either a standalone or cluster Redis connection.
enum RedisConn {
    Standalone(redis::aio::MultiplexedConnection),
    Cluster(ClusterConnection),
}

/// Macro to execute a Redis command on either connection type.
macro_rules! redis_cmd {
    ($conn:expr, $cmd:expr) => {
        match $conn {
            RedisConn::Standalone(ref mut c) => $cmd.query_async(c).await,
            RedisConn::Cluster(ref mut c) => $cmd.query_async(c).await,
        }
    };
}

/// Macro to execute a Redis script on either connection type.
macro_rules! redis_script {
    ($conn:expr, $script:expr) => {
        match $conn {
            RedisConn::Standalone(ref mut c) => $script.invoke_async(c).await,
            RedisConn::Cluster(ref mut c) => $script.invoke_async(c).await,
        }
    };
}

/// Lua script for atomic increment that preserves an existing TTL. Used so
/// the Memory-Entries Cache hit/miss counters (§4.3) don't reset their
/// expiry window on every increment.
const INCR_PRESERVE_TTL_SCRIPT: &str = r#"
local key = KEYS[1]
local delta = tonumber(ARGV[1])
local ttl = tonumber(ARGV[2])

local new_value = redis.call('INCRBY', key, delta)
if ttl > 0 and redis.call('TTL', key) < 0 then
    redis.call('EXPIRE', key, ttl)
end
return new_value
"#;

/// Internal enum to hold either a standalone or cluster Redis client.
enum RedisConnection {
    Standalone(redis::Client),
    Cluster(ClusterClient),
}

/// Redis-backed [`Cache`], used for the Memory-Entries Cache and the
/// Response Resumer's locator in multi-instance deployments (§4.3, §6.4).
pub struct RedisCache {
    connection: RedisConnection,
    key_prefix: String,
}

impl RedisCache {
    pub async fn from_config(config: &RedisCacheConfig) -> CacheResult<Self> {
        let connection = if let Some(cluster_config) = &config.cluster {
            let nodes: Vec<ConnectionInfo> = config
                .url
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| {
                    let node_url = if s.starts_with("redis://") || s.starts_with("rediss://") {
                        s.to_string()
                    } else {
                        format!("redis://{}", s)
                    };
                    node_url.into_connection_info()
                })
                .collect::<Result<Vec<_>, _>>()?;

            if nodes.is_empty() {
                return Err(super::error::CacheError::Redis(redis::RedisError::from((
                    redis::ErrorKind::InvalidClientConfig,
                    "No cluster nodes specified in URL",
                ))));
            }

            let mut builder = redis::cluster::ClusterClientBuilder::new(nodes);
            if cluster_config.read_from_replicas {
                builder = builder.read_from_replicas();
            }
            builder = builder.retries(cluster_config.retries);
            builder = builder
                .connection_timeout(Duration::from_secs(cluster_config.connection_timeout_secs));
            builder =
                builder.response_timeout(Duration::from_secs(cluster_config.response_timeout_secs));

            RedisConnection::Cluster(builder.build()?)
        } else {
            RedisConnection::Standalone(redis::Client::open(config.url.as_str())?)
        };

        Ok(Self {
            connection,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Get a Redis connection, either standalone or cluster.
    async fn get_connection(&self) -> CacheResult<RedisConn> {
        match &self.connection {
            RedisConnection::Standalone(client) => {
                let conn = client.get_multiplexed_async_connection().await?;
                Ok(RedisConn::Standalone(conn))
            }
            RedisConnection::Cluster(client) => {
                let conn = client.get_async_connection().await?;
                Ok(RedisConn::Cluster(conn))
            }
        }
    }

    /// Refresh the TTL on an existing key without touching its value.
    /// Used by the Response Resumer to keep its locator alive (§4.4.2)
    /// without a read-modify-write round trip.
    pub async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);
        let ok: bool = redis_cmd!(conn, redis::cmd("EXPIRE").arg(&full_key).arg(ttl.as_secs()))?;
        Ok(ok)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);
        let data: Option<Vec<u8>> = redis_cmd!(conn, redis::cmd("GET").arg(&full_key))?;
        Ok(data)
    }

    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        if ttl.as_secs() > 0 {
            let _: () = redis_cmd!(
                conn,
                redis::cmd("SETEX")
                    .arg(&full_key)
                    .arg(ttl.as_secs())
                    .arg(value)
            )?;
        } else {
            let _: () = redis_cmd!(conn, redis::cmd("SET").arg(&full_key).arg(value))?;
        }

        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        let result: Option<String> = if ttl.as_secs() > 0 {
            redis_cmd!(
                conn,
                redis::cmd("SET")
                    .arg(&full_key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl.as_secs())
            )?
        } else {
            redis_cmd!(conn, redis::cmd("SET").arg(&full_key).arg(value).arg("NX"))?
        };

        Ok(result.is_some())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);
        let _: () = redis_cmd!(conn, redis::cmd("DEL").arg(&full_key))?;
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64, ttl: Duration) -> CacheResult<i64> {
        let mut conn = self.get_connection().await?;
        let full_key = self.prefixed_key(key);

        if ttl.as_secs() > 0 {
            let result: i64 = redis_script!(
                conn,
                redis::Script::new(INCR_PRESERVE_TTL_SCRIPT)
                    .key(&full_key)
                    .arg(delta)
                    .arg(ttl.as_secs() as i64)
            )?;
            Ok(result)
        } else {
            let result: i64 = redis_cmd!(conn, redis::cmd("INCRBY").arg(&full_key).arg(delta))?;
            Ok(result)
        }
    }

    fn as_redis(&self) -> Option<&RedisCache> {
        Some(self)
    }
}
