//! Circuit breaker for provider calls
//!
//! Gates calls to a single provider so that a failing backend is skipped for
//! a cooldown period instead of being hammered by every request.
//!
//! # States
//!
//! - **Closed**: Normal operation, calls pass through
//! - **Open**: Failure threshold reached, calls are rejected until the
//!   recovery timeout has elapsed since the last failure
//! - **Half-Open**: Cooldown elapsed, exactly one trial call is admitted;
//!   its outcome closes or reopens the circuit
//!
//! The breaker is purely a gate: it never fails and never calls the provider
//! itself. Callers ask [`CircuitBreaker::can_execute`] and report the outcome
//! with [`CircuitBreaker::record_success`] / [`CircuitBreaker::record_failure`].
//! Time is read from the tokio clock, so paused-time tests can drive recovery.

use std::{fmt, time::Duration};

use domain::{CircuitState, ProviderId};
use parking_lot::RwLock;
use tokio::time::Instant;

/// Configuration for a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures (without an intervening success) that open the circuit
    pub failure_threshold: u32,
    /// Time since the last failure before a trial call is admitted
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a configuration for a sensitive/critical provider (lower thresholds)
    #[must_use]
    pub const fn sensitive() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
        }
    }

    /// Creates a configuration for a resilient provider (higher thresholds)
    #[must_use]
    pub const fn resilient() -> Self {
        Self {
            failure_threshold: 10,
            recovery_timeout: Duration::from_secs(120),
        }
    }

    /// Creates a custom configuration
    ///
    /// A zero threshold is raised to one.
    #[must_use]
    pub const fn custom(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold: if failure_threshold == 0 { 1 } else { failure_threshold },
            recovery_timeout,
        }
    }
}

/// Internal state tracking
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    /// When the half-open trial was handed out
    trial_started: Option<Instant>,
}

impl BreakerState {
    const fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            trial_started: None,
        }
    }
}

/// Per-provider circuit breaker
pub struct CircuitBreaker {
    provider: ProviderId,
    config: CircuitBreakerConfig,
    state: RwLock<BreakerState>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("CircuitBreaker")
            .field("provider", &self.provider)
            .field("state", &state.state)
            .field("failure_count", &state.failure_count)
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Creates a closed circuit breaker
    #[must_use]
    pub fn new(provider: ProviderId, config: CircuitBreakerConfig) -> Self {
        Self {
            provider,
            config: CircuitBreakerConfig::custom(config.failure_threshold, config.recovery_timeout),
            state: RwLock::new(BreakerState::closed()),
        }
    }

    /// The provider guarded by this breaker
    #[must_use]
    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    #[must_use]
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, without applying any time-based transition
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state.read().state
    }

    /// Failures recorded since the last success or reset
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.state.read().failure_count
    }

    /// Whether the circuit is currently open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Time left before an open circuit admits a trial call
    #[must_use]
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        let state = self.state.read();
        if state.state != CircuitState::Open {
            return None;
        }
        let elapsed = state.last_failure.map_or(self.config.recovery_timeout, |at| at.elapsed());
        Some(self.config.recovery_timeout.saturating_sub(elapsed))
    }

    fn cooled_down(&self, since: Option<Instant>) -> bool {
        since.is_none_or(|at| at.elapsed() >= self.config.recovery_timeout)
    }

    /// Whether a call would be admitted right now, without claiming anything
    ///
    /// Used when building fallback chains; [`Self::can_execute`] must still be
    /// called immediately before the provider is invoked.
    #[must_use]
    pub fn would_admit(&self) -> bool {
        let state = self.state.read();
        match state.state {
            CircuitState::Closed => true,
            CircuitState::Open => self.cooled_down(state.last_failure),
            CircuitState::HalfOpen => self.cooled_down(state.trial_started),
        }
    }

    /// Ask the breaker for permission to call the provider
    ///
    /// An open circuit whose cooldown has elapsed moves to half-open and hands
    /// the single trial call to this caller. While that trial is outstanding,
    /// further calls are rejected. A trial never reported back (the caller was
    /// cancelled) is reissued after another recovery timeout.
    pub fn can_execute(&self) -> bool {
        let mut state = self.state.write();
        match state.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if !self.cooled_down(state.last_failure) {
                    return false;
                }
                tracing::info!(
                    provider = %self.provider,
                    failures = state.failure_count,
                    "Circuit transitioning from Open to HalfOpen"
                );
                state.state = CircuitState::HalfOpen;
                state.trial_started = Some(Instant::now());
                true
            },
            CircuitState::HalfOpen => {
                if !self.cooled_down(state.trial_started) {
                    return false;
                }
                tracing::debug!(provider = %self.provider, "Reissuing half-open trial");
                state.trial_started = Some(Instant::now());
                true
            },
        }
    }

    /// Records a successful call
    pub fn record_success(&self) {
        let mut state = self.state.write();
        if state.state != CircuitState::Closed {
            tracing::info!(
                provider = %self.provider,
                from = %state.state,
                "Circuit transitioning to Closed after success"
            );
        }
        *state = BreakerState::closed();
    }

    /// Records a failed call
    pub fn record_failure(&self) {
        let mut state = self.state.write();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure = Some(Instant::now());

        match state.state {
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    tracing::warn!(
                        provider = %self.provider,
                        failures = state.failure_count,
                        "Circuit transitioning from Closed to Open"
                    );
                    state.state = CircuitState::Open;
                }
            },
            CircuitState::HalfOpen => {
                tracing::warn!(
                    provider = %self.provider,
                    failures = state.failure_count,
                    "Circuit transitioning from HalfOpen to Open after failed trial"
                );
                state.state = CircuitState::Open;
                state.trial_started = None;
            },
            CircuitState::Open => {},
        }
    }

    /// Force the circuit closed and forget all failures
    pub fn reset(&self) {
        let mut state = self.state.write();
        if state.state != CircuitState::Closed {
            tracing::info!(provider = %self.provider, from = %state.state, "Circuit manually reset");
        }
        *state = BreakerState::closed();
    }
}
