//! Provider health registry
//!
//! Owns one [`CircuitBreaker`] and one health record per provider. Updates
//! for a single provider are serialized by that provider's locks; providers
//! never contend with each other.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use domain::{CircuitState, HealthStatus, ProviderId, ServiceHealth};
use parking_lot::Mutex;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};

#[derive(Debug, Clone, Copy)]
struct HealthRecord {
    status: HealthStatus,
    consecutive_failures: u32,
    last_check: DateTime<Utc>,
}

impl HealthRecord {
    fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            consecutive_failures: 0,
            last_check: Utc::now(),
        }
    }
}

struct ProviderEntry {
    breaker: CircuitBreaker,
    record: Mutex<HealthRecord>,
}

/// Breakers and health records for a fixed set of providers
pub struct HealthRegistry {
    providers: BTreeMap<ProviderId, ProviderEntry>,
}

impl fmt::Debug for HealthRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HealthRegistry {
    /// Create a registry with one closed breaker per provider
    pub fn new(providers: impl IntoIterator<Item = (ProviderId, CircuitBreakerConfig)>) -> Self {
        let providers = providers
            .into_iter()
            .map(|(provider, config)| {
                let entry = ProviderEntry {
                    breaker: CircuitBreaker::new(provider, config),
                    record: Mutex::new(HealthRecord::healthy()),
                };
                (provider, entry)
            })
            .collect();
        Self { providers }
    }

    /// Registered providers in stable order
    pub fn providers(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.providers.keys().copied()
    }

    #[must_use]
    pub fn contains(&self, provider: ProviderId) -> bool {
        self.providers.contains_key(&provider)
    }

    /// The breaker guarding `provider`
    #[must_use]
    pub fn breaker(&self, provider: ProviderId) -> Option<&CircuitBreaker> {
        self.providers.get(&provider).map(|entry| &entry.breaker)
    }

    /// Claim permission to call `provider`; unknown providers are never admitted
    pub fn can_execute(&self, provider: ProviderId) -> bool {
        self.breaker(provider).is_some_and(CircuitBreaker::can_execute)
    }

    /// Whether `provider` would be admitted, without claiming a half-open trial
    #[must_use]
    pub fn would_admit(&self, provider: ProviderId) -> bool {
        self.breaker(provider).is_some_and(CircuitBreaker::would_admit)
    }

    /// Record a successful call on the breaker and the health record
    pub fn record_success(&self, provider: ProviderId) {
        if let Some(entry) = self.providers.get(&provider) {
            entry.breaker.record_success();
        }
        self.update(provider, true);
    }

    /// Record a failed call on the breaker and the health record
    pub fn record_failure(&self, provider: ProviderId) {
        if let Some(entry) = self.providers.get(&provider) {
            entry.breaker.record_failure();
        }
        self.update(provider, false);
    }

    /// Update the health record after a call outcome
    ///
    /// Failure status mirrors the breaker: unhealthy once it has opened,
    /// degraded while it is still closed.
    pub fn update(&self, provider: ProviderId, success: bool) {
        let Some(entry) = self.providers.get(&provider) else {
            tracing::debug!(%provider, "Ignoring health update for unregistered provider");
            return;
        };
        let breaker_open = entry.breaker.is_open();
        let mut record = entry.record.lock();
        record.last_check = Utc::now();
        if success {
            record.consecutive_failures = 0;
            record.status = HealthStatus::Healthy;
        } else {
            record.consecutive_failures = record.consecutive_failures.saturating_add(1);
            record.status = if breaker_open {
                HealthStatus::Unhealthy
            } else {
                HealthStatus::Degraded
            };
        }
    }

    /// Read-only health snapshot for one provider
    #[must_use]
    pub fn get_health(&self, provider: ProviderId) -> Option<ServiceHealth> {
        let entry = self.providers.get(&provider)?;
        let circuit_state = entry.breaker.state();
        let record = *entry.record.lock();
        let status = if circuit_state == CircuitState::Open {
            HealthStatus::CircuitOpen
        } else {
            record.status
        };
        Some(ServiceHealth {
            provider,
            status,
            circuit_state,
            consecutive_failures: record.consecutive_failures,
            last_check: record.last_check,
            retry_after_secs: entry.breaker.remaining_cooldown().map(|left| {
                left.as_secs() + u64::from(left.subsec_nanos() > 0)
            }),
        })
    }

    /// Read-only health snapshot for every provider
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<ProviderId, ServiceHealth> {
        self.providers()
            .filter_map(|provider| self.get_health(provider).map(|health| (provider, health)))
            .collect()
    }

    /// Close every breaker and mark every provider healthy
    pub fn reset(&self) {
        for provider in self.providers.keys() {
            self.reset_provider(*provider);
        }
    }

    /// Close one provider's breaker and mark it healthy
    ///
    /// Returns `false` when the provider is not registered.
    pub fn reset_provider(&self, provider: ProviderId) -> bool {
        let Some(entry) = self.providers.get(&provider) else {
            return false;
        };
        entry.breaker.reset();
        *entry.record.lock() = HealthRecord::healthy();
        true
    }
}
