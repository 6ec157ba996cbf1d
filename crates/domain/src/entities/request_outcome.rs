//! Per-attempt outcome record

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::value_objects::{ErrorCategory, Operation, ProviderId};

/// Result of a single provider attempt, used for logs and metrics only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub operation: Operation,
    pub provider: ProviderId,
    pub success: bool,
    pub latency: Duration,
    pub error_category: Option<ErrorCategory>,
    /// Retries already spent on this provider before this attempt
    pub retries_used: u32,
}

impl RequestOutcome {
    pub const fn success(
        operation: Operation,
        provider: ProviderId,
        latency: Duration,
        retries_used: u32,
    ) -> Self {
        Self {
            operation,
            provider,
            success: true,
            latency,
            error_category: None,
            retries_used,
        }
    }

    pub const fn failure(
        operation: Operation,
        provider: ProviderId,
        latency: Duration,
        category: ErrorCategory,
        retries_used: u32,
    ) -> Self {
        Self {
            operation,
            provider,
            success: false,
            latency,
            error_category: Some(category),
            retries_used,
        }
    }

    /// Outcome label used in structured logs
    #[must_use]
    pub const fn outcome_label(&self) -> &'static str {
        if self.success { "success" } else { "failure" }
    }

    /// Latency in whole milliseconds, saturating
    #[must_use]
    pub fn latency_ms(&self) -> u64 {
        u64::try_from(self.latency.as_millis()).unwrap_or(u64::MAX)
    }
}
