//! Infrastructure adapters
//!
//! Adapters connect application ports to concrete implementations.

mod metrics_outcome_recorder;

pub use metrics_outcome_recorder::{
    ATTEMPT_DURATION_SECONDS, ATTEMPTS_TOTAL, CACHE_LOOKUPS_TOTAL, DEGRADED_TOTAL,
    MetricsOutcomeRecorder,
};
