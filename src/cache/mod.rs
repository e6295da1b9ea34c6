mod error;
mod locator;
mod memory;
mod memory_entries;
#[cfg(feature = "redis-backend")]
mod redis;
mod traits;

pub use error::{CacheError, CacheResult};
pub use locator::{RecordingLocator, ResumerLocator};
pub use memory::MemoryCache;
pub use memory_entries::{CachedAgentEntries, MemoryEntriesCache};
#[cfg(feature = "redis-backend")]
pub use redis::RedisCache;
pub use traits::{Cache, CacheExt};
