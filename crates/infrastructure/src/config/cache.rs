//! Cache configuration with TTL settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::default_true;
use crate::cache::MokaCacheConfig;

/// Result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheAppConfig {
    /// Whether speech results are cached
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entry lifetime in seconds (default: 1 hour)
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Memory budget in megabytes (default: 100MB)
    #[serde(default = "default_max_capacity_mb")]
    pub max_capacity_mb: u64,

    /// Evict entries not read for this many seconds
    #[serde(default = "default_time_to_idle")]
    pub time_to_idle_secs: Option<u64>,
}

const fn default_ttl() -> u64 {
    60 * 60 // 1 hour
}

const fn default_max_capacity_mb() -> u64 {
    100
}

#[allow(clippy::unnecessary_wraps)]
const fn default_time_to_idle() -> Option<u64> {
    Some(30 * 60) // 30 minutes
}

impl Default for CacheAppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl(),
            max_capacity_mb: default_max_capacity_mb(),
            time_to_idle_secs: default_time_to_idle(),
        }
    }
}

impl CacheAppConfig {
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    #[must_use]
    pub fn to_moka_config(&self) -> MokaCacheConfig {
        MokaCacheConfig {
            max_capacity_mb: self.max_capacity_mb,
            default_ttl: self.ttl(),
            time_to_idle: self
                .time_to_idle_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}
