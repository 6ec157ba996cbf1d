//! Retry policy engine
//!
//! One exponential backoff schedule per [`ErrorCategory`]. Delays grow as
//! `base_delay * backoff_factor^attempt`, are capped at `max_delay`, and may
//! carry 10-30 % of positive jitter to spread out synchronized retries.

use std::time::Duration;

use domain::ErrorCategory;
use rand::Rng;

/// Lower bound of the jitter fraction added to a delay
pub const JITTER_MIN: f64 = 0.1;
/// Upper bound of the jitter fraction added to a delay
pub const JITTER_MAX: f64 = 0.3;

/// Backoff schedule for one error category
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub backoff_factor: f64,
    /// Whether to add jitter
    pub jitter_enabled: bool,
}

impl RetryPolicy {
    /// Create a policy with jitter enabled
    #[must_use]
    pub const fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_factor: f64,
    ) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            backoff_factor,
            jitter_enabled: true,
        }
    }

    /// A policy that never retries
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
            jitter_enabled: false,
        }
    }

    /// Disable jitter (deterministic schedules for tests)
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter_enabled = false;
        self
    }

    /// Whether another retry is allowed after `retries_used` retries
    #[must_use]
    pub const fn allows_retry(&self, retries_used: u32) -> bool {
        retries_used < self.max_retries
    }

    /// Delay before retry number `attempt` (0-indexed), without jitter
    ///
    /// Factors below 1 are treated as 1 so the schedule never shrinks.
    #[must_use]
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.max(1.0).powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Delay before retry number `attempt` (0-indexed), jitter included
    ///
    /// The result never exceeds `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for_attempt(attempt);
        if !self.jitter_enabled || delay.is_zero() {
            return delay;
        }
        let fraction = rand::rng().random_range(JITTER_MIN..=JITTER_MAX);
        delay.mul_f64(1.0 + fraction).min(self.max_delay)
    }
}

/// Retry policies for every error category
///
/// The permanent policy is fixed at zero retries and cannot be overridden.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicies {
    transient: RetryPolicy,
    service_unavailable: RetryPolicy,
    quota_exceeded: RetryPolicy,
    permanent: RetryPolicy,
}

/// Cap shared by the default policies
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

impl RetryPolicies {
    #[must_use]
    pub const fn new(
        transient: RetryPolicy,
        service_unavailable: RetryPolicy,
        quota_exceeded: RetryPolicy,
    ) -> Self {
        Self {
            transient,
            service_unavailable,
            quota_exceeded,
            permanent: RetryPolicy::no_retry(),
        }
    }

    /// Default transient policy: 3 retries, 1s doubling
    #[must_use]
    pub const fn default_transient() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(1), DEFAULT_MAX_DELAY, 2.0)
    }

    /// Default service-unavailable policy: 2 retries, 2s tripling
    #[must_use]
    pub const fn default_service_unavailable() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_secs(2), DEFAULT_MAX_DELAY, 3.0)
    }

    /// Default quota policy: a single retry after 5s
    #[must_use]
    pub const fn default_quota_exceeded() -> RetryPolicy {
        RetryPolicy::new(1, Duration::from_secs(5), DEFAULT_MAX_DELAY, 1.0)
    }

    /// The policy applied to failures of `category`
    #[must_use]
    pub const fn for_category(&self, category: ErrorCategory) -> &RetryPolicy {
        match category {
            ErrorCategory::Transient => &self.transient,
            ErrorCategory::ServiceUnavailable => &self.service_unavailable,
            ErrorCategory::QuotaExceeded => &self.quota_exceeded,
            ErrorCategory::Permanent => &self.permanent,
        }
    }

    /// Disable jitter on every policy
    #[must_use]
    pub fn without_jitter(self) -> Self {
        Self {
            transient: self.transient.without_jitter(),
            service_unavailable: self.service_unavailable.without_jitter(),
            quota_exceeded: self.quota_exceeded.without_jitter(),
            permanent: self.permanent,
        }
    }
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self::new(
            Self::default_transient(),
            Self::default_service_unavailable(),
            Self::default_quota_exceeded(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedules_match_categories() {
        let policies = RetryPolicies::default().without_jitter();

        let transient = policies.for_category(ErrorCategory::Transient);
        assert_eq!(transient.max_retries, 3);
        assert_eq!(transient.base_delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(transient.base_delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(transient.base_delay_for_attempt(2), Duration::from_secs(4));

        let unavailable = policies.for_category(ErrorCategory::ServiceUnavailable);
        assert_eq!(unavailable.max_retries, 2);
        assert_eq!(unavailable.base_delay_for_attempt(0), Duration::from_secs(2));
        assert_eq!(unavailable.base_delay_for_attempt(1), Duration::from_secs(6));

        let quota = policies.for_category(ErrorCategory::QuotaExceeded);
        assert_eq!(quota.max_retries, 1);
        assert_eq!(quota.base_delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(quota.base_delay_for_attempt(3), Duration::from_secs(5));
    }

    #[test]
    fn permanent_never_retries() {
        let policies = RetryPolicies::default();
        let permanent = policies.for_category(ErrorCategory::Permanent);
        assert_eq!(permanent.max_retries, 0);
        assert!(!permanent.allows_retry(0));
    }

    #[test]
    fn delay_is_capped_at_max() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(30), 2.0)
            .without_jitter();
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(16));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(60), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(30), 2.0);
        for _ in 0..200 {
            let delay = policy.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(2200), "{delay:?}");
            assert!(delay <= Duration::from_millis(2600), "{delay:?}");
        }
    }

    #[test]
    fn jitter_never_exceeds_max_delay() {
        let policy = RetryPolicy::new(3, Duration::from_secs(30), Duration::from_secs(30), 2.0);
        for _ in 0..50 {
            assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(30));
        }
    }

    #[test]
    fn zero_base_delay_yields_zero() {
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::from_secs(30), 2.0);
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(100), Duration::ZERO);
    }

    #[test]
    fn shrinking_factor_is_treated_as_constant() {
        let policy = RetryPolicy::new(3, Duration::from_secs(4), Duration::from_secs(30), 0.5)
            .without_jitter();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn allows_retry_counts_up_to_max() {
        let policy = RetryPolicies::default_transient();
        assert!(policy.allows_retry(0));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
    }
}
