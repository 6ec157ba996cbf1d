//! Error category - Coarse classification of provider failures

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a provider failure, selecting the retry policy applied to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Network hiccups, timeouts, throttling
    Transient,
    /// Credential, request-format and authorization errors
    Permanent,
    /// Upstream 5xx responses
    ServiceUnavailable,
    /// Quota or request budget exhausted
    QuotaExceeded,
}

impl ErrorCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::ServiceUnavailable => "service_unavailable",
            Self::QuotaExceeded => "quota_exceeded",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
