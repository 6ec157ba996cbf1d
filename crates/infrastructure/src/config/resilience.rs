//! Resilience configurations: Circuit breakers, Retry policies, Timeouts.

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use application::{
    ApplicationError, CircuitBreakerConfig, OrchestratorConfig, RetryPolicies, RetryPolicy,
};
use domain::{OperationFamily, ProviderId};
use serde::{Deserialize, Serialize};

// ==============================
// Circuit Breaker Configuration
// ==============================

/// Circuit breaker thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerAppConfig {
    /// Consecutive failures before the circuit opens (default: 5)
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds an open circuit waits before a trial call (default: 60)
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout_secs: u64,
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_recovery_timeout() -> u64 {
    60
}

impl Default for BreakerAppConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout(),
        }
    }
}

impl BreakerAppConfig {
    #[must_use]
    pub const fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::custom(
            self.failure_threshold,
            Duration::from_secs(self.recovery_timeout_secs),
        )
    }
}

// ==============================
// Retry Configuration
// ==============================

/// Partial override of one category's retry policy
///
/// Unset fields keep the category default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicyAppConfig {
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff_factor: Option<f64>,
    pub jitter: Option<bool>,
}

impl RetryPolicyAppConfig {
    /// Apply the overrides on top of `defaults`
    pub fn apply(&self, defaults: RetryPolicy, category: &str) -> Result<RetryPolicy, ApplicationError> {
        let policy = RetryPolicy {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            base_delay: self
                .base_delay_ms
                .map_or(defaults.base_delay, Duration::from_millis),
            max_delay: self
                .max_delay_ms
                .map_or(defaults.max_delay, Duration::from_millis),
            backoff_factor: self.backoff_factor.unwrap_or(defaults.backoff_factor),
            jitter_enabled: self.jitter.unwrap_or(defaults.jitter_enabled),
        };

        if !policy.backoff_factor.is_finite() || policy.backoff_factor <= 0.0 {
            return Err(ApplicationError::Configuration(format!(
                "resilience.retry.{category}.backoff_factor must be a positive number"
            )));
        }
        if policy.max_delay < policy.base_delay {
            return Err(ApplicationError::Configuration(format!(
                "resilience.retry.{category}: max_delay_ms is below base_delay_ms"
            )));
        }
        Ok(policy)
    }
}

/// Retry overrides per retryable error category
///
/// Permanent errors are never retried and have no section here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryAppConfig {
    #[serde(default)]
    pub transient: RetryPolicyAppConfig,

    #[serde(default)]
    pub service_unavailable: RetryPolicyAppConfig,

    #[serde(default)]
    pub quota_exceeded: RetryPolicyAppConfig,
}

impl RetryAppConfig {
    pub fn to_policies(&self) -> Result<RetryPolicies, ApplicationError> {
        Ok(RetryPolicies::new(
            self.transient
                .apply(RetryPolicies::default_transient(), "transient")?,
            self.service_unavailable.apply(
                RetryPolicies::default_service_unavailable(),
                "service_unavailable",
            )?,
            self.quota_exceeded
                .apply(RetryPolicies::default_quota_exceeded(), "quota_exceeded")?,
        ))
    }
}

// ==============================
// Resilience Configuration
// ==============================

/// Circuit breaker, retry and timeout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceAppConfig {
    /// Bound for a single provider call in seconds (default: 30)
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Breaker settings shared by every provider
    #[serde(default)]
    pub circuit_breaker: BreakerAppConfig,

    /// Breaker settings per family ("text_generation", "speech_synthesis")
    #[serde(default)]
    pub family_breakers: BTreeMap<String, BreakerAppConfig>,

    /// Breaker settings per provider name; these win over family settings
    #[serde(default)]
    pub breaker_overrides: BTreeMap<String, BreakerAppConfig>,

    #[serde(default)]
    pub retry: RetryAppConfig,
}

const fn default_call_timeout() -> u64 {
    30
}

impl Default for ResilienceAppConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout(),
            circuit_breaker: BreakerAppConfig::default(),
            family_breakers: BTreeMap::new(),
            breaker_overrides: BTreeMap::new(),
            retry: RetryAppConfig::default(),
        }
    }
}

impl ResilienceAppConfig {
    /// Breaker settings for every provider of `family`
    fn family_breaker(&self, family: OperationFamily) -> Result<BreakerAppConfig, ApplicationError> {
        if let Some(unknown) = self.family_breakers.keys().find(|name| {
            name.as_str() != OperationFamily::TextGeneration.as_str()
                && name.as_str() != OperationFamily::SpeechSynthesis.as_str()
        }) {
            return Err(ApplicationError::Configuration(format!(
                "resilience.family_breakers: unknown family {unknown}"
            )));
        }
        Ok(self
            .family_breakers
            .get(family.as_str())
            .copied()
            .unwrap_or(self.circuit_breaker))
    }

    /// Assemble the orchestrator settings for `family`
    pub fn orchestrator_config(
        &self,
        family: OperationFamily,
        provider_timeouts: HashMap<ProviderId, Duration>,
    ) -> Result<OrchestratorConfig, ApplicationError> {
        if self.call_timeout_secs == 0 {
            return Err(ApplicationError::Configuration(
                "resilience.call_timeout_secs must be positive".to_string(),
            ));
        }

        let mut breaker_overrides = HashMap::new();
        for (name, breaker) in &self.breaker_overrides {
            let provider: ProviderId = name.parse().map_err(|e| {
                ApplicationError::Configuration(format!("resilience.breaker_overrides: {e}"))
            })?;
            if provider.family() == family {
                breaker_overrides.insert(provider, breaker.to_breaker_config());
            }
        }

        Ok(OrchestratorConfig {
            circuit_breaker: self.family_breaker(family)?.to_breaker_config(),
            breaker_overrides,
            retry: self.retry.to_policies()?,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            provider_timeouts,
        })
    }
}
