//! Outcome recorder backed by the `metrics` facade
//!
//! Metrics:
//! - `provider_attempts_total` (counter): attempts by operation, provider,
//!   outcome and error category
//! - `provider_attempt_duration_seconds` (histogram): attempt latency by
//!   operation and provider
//! - `orchestrator_degraded_total` (counter): terminal fallbacks served
//! - `orchestrator_cache_lookups_total` (counter): result cache lookups by
//!   operation and result (`hit`, `miss`, `coalesced`)
//!
//! Nothing is exported unless the host process installs a recorder.

use application::ports::{CacheLookup, OutcomeRecorderPort};
use domain::{Operation, RequestOutcome};
use metrics::{counter, histogram};

pub const ATTEMPTS_TOTAL: &str = "provider_attempts_total";
pub const ATTEMPT_DURATION_SECONDS: &str = "provider_attempt_duration_seconds";
pub const DEGRADED_TOTAL: &str = "orchestrator_degraded_total";
pub const CACHE_LOOKUPS_TOTAL: &str = "orchestrator_cache_lookups_total";

/// Category label for an attempt; successes carry `none`
pub(crate) fn category_label(outcome: &RequestOutcome) -> &'static str {
    outcome.error_category.map_or("none", |category| category.as_str())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsOutcomeRecorder;

impl MetricsOutcomeRecorder {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl OutcomeRecorderPort for MetricsOutcomeRecorder {
    fn record_attempt(&self, outcome: &RequestOutcome) {
        counter!(
            ATTEMPTS_TOTAL,
            "operation" => outcome.operation.as_str(),
            "provider" => outcome.provider.as_str(),
            "outcome" => outcome.outcome_label(),
            "category" => category_label(outcome),
        )
        .increment(1);
        histogram!(
            ATTEMPT_DURATION_SECONDS,
            "operation" => outcome.operation.as_str(),
            "provider" => outcome.provider.as_str(),
        )
        .record(outcome.latency.as_secs_f64());
    }

    fn record_degraded(&self, operation: Operation) {
        counter!(DEGRADED_TOTAL, "operation" => operation.as_str()).increment(1);
    }

    fn record_cache_lookup(&self, operation: Operation, lookup: CacheLookup) {
        counter!(
            CACHE_LOOKUPS_TOTAL,
            "operation" => operation.as_str(),
            "result" => lookup.as_str(),
        )
        .increment(1);
    }
}
