//! Moka in-memory cache implementation
//!
//! Thread-safe in-memory result store with TTL and size-based eviction.

use std::time::Duration;

use application::{error::ApplicationError, ports::CachePort};
use async_trait::async_trait;
use moka::future::Cache;
use tracing::{debug, instrument};

/// Maximum cache size in MB
const DEFAULT_MAX_CAPACITY_MB: u64 = 100;

/// Configuration for Moka cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MokaCacheConfig {
    /// Maximum capacity in megabytes
    pub max_capacity_mb: u64,
    /// TTL applied to every entry
    pub default_ttl: Duration,
    /// Time to idle before eviction (optional)
    pub time_to_idle: Option<Duration>,
}

impl Default for MokaCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity_mb: DEFAULT_MAX_CAPACITY_MB,
            default_ttl: Duration::from_secs(3600),        // 1 hour
            time_to_idle: Some(Duration::from_secs(1800)), // 30 minutes
        }
    }
}

/// Moka-based in-memory cache
///
/// Entries are weighed by payload size, so audio clips count against the
/// memory budget by their real length.
///
/// Note: Moka 0.12 uses a cache-level TTL configured at build time. The
/// per-call TTL passed to [`CachePort::save`] is ignored; the result cache
/// always passes the configured TTL anyway.
pub struct MokaCache {
    cache: Cache<String, Vec<u8>>,
}

impl std::fmt::Debug for MokaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCache")
            .field("entries", &self.cache.entry_count())
            .field("weighted_bytes", &self.cache.weighted_size())
            .finish()
    }
}

impl MokaCache {
    /// Create a new Moka cache with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MokaCacheConfig::default())
    }

    /// Create a new Moka cache with custom configuration
    #[must_use]
    pub fn with_config(config: MokaCacheConfig) -> Self {
        let max_capacity_bytes = config.max_capacity_mb.saturating_mul(1024 * 1024);

        let mut builder = Cache::builder()
            .max_capacity(max_capacity_bytes)
            .time_to_live(config.default_ttl)
            .weigher(|key: &String, value: &Vec<u8>| -> u32 {
                (key.len() + value.len()).try_into().unwrap_or(u32::MAX)
            });

        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        Self {
            cache: builder.build(),
        }
    }
}

impl Default for MokaCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CachePort for MokaCache {
    #[instrument(skip(self), level = "debug")]
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        let payload = self.cache.get(key).await;
        debug!(key = %key, bytes = payload.as_ref().map(Vec::len), "Cache load");
        Ok(payload)
    }

    #[instrument(skip(self, payload), level = "debug")]
    async fn save(
        &self,
        key: &str,
        payload: Vec<u8>,
        _ttl: Duration,
    ) -> Result<(), ApplicationError> {
        let bytes = payload.len();
        self.cache.insert(key.to_string(), payload).await;
        debug!(key = %key, bytes, "Cache save");
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn purge_prefix(&self, prefix: &str) -> Result<u64, ApplicationError> {
        self.cache.run_pending_tasks().await;

        // Iterator yields (Arc<K>, V); collect first, the cache can't be
        // modified while iterating
        let keys_to_remove: Vec<String> = self
            .cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| (*k).clone())
            .collect();

        let mut count = 0u64;
        for key in keys_to_remove {
            if self.cache.remove(&key).await.is_some() {
                count += 1;
            }
        }

        debug!(prefix = %prefix, count, "Prefix purge complete");
        Ok(count)
    }
}
