//! Service health snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{CircuitState, HealthStatus, ProviderId};

/// Read-only view of a provider's health, as exposed to dashboards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub provider: ProviderId,
    pub status: HealthStatus,
    pub circuit_state: CircuitState,
    pub consecutive_failures: u32,
    pub last_check: DateTime<Utc>,
    /// Seconds until an open circuit admits a trial call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ServiceHealth {
    /// A provider that has not been called yet
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            status: HealthStatus::Healthy,
            circuit_state: CircuitState::Closed,
            consecutive_failures: 0,
            last_check: Utc::now(),
            retry_after_secs: None,
        }
    }

    /// Whether the breaker currently lets calls through
    #[must_use]
    pub const fn accepts_calls(&self) -> bool {
        !matches!(self.circuit_state, CircuitState::Open)
    }
}
