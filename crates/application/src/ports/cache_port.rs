//! Result store port
//!
//! Byte-oriented storage behind the result cache. The store never sees typed
//! values: encoding, key derivation and hit accounting belong to
//! [`ResultCache`](crate::services::ResultCache). Writes for the same key carry
//! identical payloads, so a store may apply concurrent duplicates in any order.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ApplicationError;

/// Storage for encoded orchestration results
#[async_trait]
pub trait CachePort: Send + Sync + std::fmt::Debug {
    /// Payload stored under `key`, if present and not expired
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, ApplicationError>;

    /// Store `payload` under `key`, replacing any previous payload
    ///
    /// Stores with a single cache-wide expiry may ignore `ttl`.
    async fn save(&self, key: &str, payload: Vec<u8>, ttl: Duration)
    -> Result<(), ApplicationError>;

    /// Remove every entry whose key starts with `prefix`; returns the count
    async fn purge_prefix(&self, prefix: &str) -> Result<u64, ApplicationError>;
}
