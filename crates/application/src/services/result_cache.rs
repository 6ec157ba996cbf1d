//! Content-addressed result cache
//!
//! Memoizes provider results under a key derived from the normalized request
//! content and the provider-agnostic settings that influence the output. A
//! hit bypasses fallback chains and circuit breakers entirely. Store errors
//! never fail a request: they are logged, counted and treated as misses.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use domain::{Operation, ProviderId};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

use super::single_flight::{FlightGuard, SingleFlight};
use crate::{error::ApplicationError, ports::CachePort};

/// Generate a cache key from a prefix and components using blake3
///
/// Every component is length-prefixed, so no choice of component contents
/// makes two different component lists hash alike.
pub fn generate_cache_key(prefix: &str, components: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for component in components {
        hasher.update(&(component.len() as u64).to_le_bytes());
        hasher.update(component.as_bytes());
    }
    format!("{prefix}:{}", hasher.finalize().to_hex())
}

/// Trim and collapse whitespace runs so cosmetic differences share a key
pub fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stored result with provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub provider: ProviderId,
    pub stored_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, provider: ProviderId) -> Self {
        Self {
            value,
            provider,
            stored_at: Utc::now(),
        }
    }
}

/// Result cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub writes: u64,
    /// Requests served by a result another in-flight request produced
    pub coalesced_hits: u64,
}

impl ResultCacheStats {
    /// Fraction of lookups answered from the cache (0.0 - 1.0)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    writes: AtomicU64,
    coalesced_hits: AtomicU64,
}

/// Typed result cache over a byte-oriented [`CachePort`]
pub struct ResultCache {
    store: Arc<dyn CachePort>,
    ttl: Duration,
    settings_hash: String,
    counters: Counters,
    flights: SingleFlight,
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("store", &self.store)
            .field("ttl", &self.ttl)
            .field("settings_hash", &self.settings_hash)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl ResultCache {
    /// Create a cache writing entries with `ttl`
    pub fn new(store: Arc<dyn CachePort>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            settings_hash: String::new(),
            counters: Counters::default(),
            flights: SingleFlight::new(),
        }
    }

    /// Fold output-affecting settings into every key
    ///
    /// Changing any of them (for example a voice settings version) makes old
    /// entries unreachable.
    #[must_use]
    pub fn with_settings(mut self, settings: &[&str]) -> Self {
        self.settings_hash = generate_cache_key("settings", settings);
        self
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Key for `operation` over already-normalized request components
    pub fn key(&self, operation: Operation, components: &[String]) -> String {
        let mut parts: Vec<&str> = components.iter().map(String::as_str).collect();
        parts.push(&self.settings_hash);
        generate_cache_key(operation.as_str(), &parts)
    }

    /// Look up `key`, counting a hit or a miss
    #[instrument(skip(self), level = "debug")]
    pub async fn lookup<T>(&self, key: &str) -> Option<CacheEntry<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let entry = self.fetch(key).await;
        if entry.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Result cache hit");
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Result cache miss");
        }
        entry
    }

    /// Look up `key` again after waiting behind another request for it
    pub async fn recheck<T>(&self, key: &str) -> Option<CacheEntry<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let entry = self.fetch(key).await;
        if entry.is_some() {
            self.counters.coalesced_hits.fetch_add(1, Ordering::Relaxed);
        }
        entry
    }

    async fn fetch<T>(&self, key: &str) -> Option<CacheEntry<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let fetched = self.store.load(key).await.and_then(|payload| {
            payload
                .map(|bytes| {
                    serde_json::from_slice::<CacheEntry<T>>(&bytes).map_err(|e| {
                        ApplicationError::Cache(format!("undecodable entry under {key}: {e}"))
                    })
                })
                .transpose()
        });
        match fetched {
            Ok(entry) => entry,
            Err(error) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(key, %error, "Result cache read failed, treating as miss");
                None
            },
        }
    }

    /// Store an entry; failures are logged and counted, never returned
    #[instrument(skip(self, entry), level = "debug")]
    pub async fn store<T>(&self, key: &str, entry: &CacheEntry<T>)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let saved = match serde_json::to_vec(entry) {
            Ok(payload) => self.store.save(key, payload, self.ttl).await,
            Err(e) => Err(ApplicationError::Cache(format!("unencodable entry for {key}: {e}"))),
        };
        match saved {
            Ok(()) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
                debug!(provider = %entry.provider, "Result cached");
            },
            Err(error) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(key, %error, "Result cache write failed");
            },
        }
    }

    /// Drop every entry for `operation`
    pub async fn invalidate_operation(&self, operation: Operation) -> u64 {
        let prefix = format!("{}:", operation.as_str());
        match self.store.purge_prefix(&prefix).await {
            Ok(removed) => removed,
            Err(error) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(%operation, %error, "Result cache invalidation failed");
                0
            },
        }
    }

    /// Serialize concurrent producers of the same key
    pub async fn acquire_flight(&self, key: &str) -> FlightGuard<'_> {
        self.flights.acquire(key).await
    }

    #[must_use]
    pub fn stats(&self) -> ResultCacheStats {
        ResultCacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            coalesced_hits: self.counters.coalesced_hits.load(Ordering::Relaxed),
        }
    }
}
