//! Outcome recorder port - Sink for per-attempt observations

use domain::{Operation, RequestOutcome};
#[cfg(test)]
use mockall::automock;

/// How a cached operation's lookup was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheLookup {
    /// Found on the first lookup
    Hit,
    /// Not found; a provider chain produced the result
    Miss,
    /// Produced by a concurrent request this one waited behind
    Coalesced,
}

impl CacheLookup {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Coalesced => "coalesced",
        }
    }
}

/// Receives every provider attempt and orchestration-level event
///
/// Implementations must be cheap and non-blocking; they are called inline on
/// the request path.
#[cfg_attr(test, automock)]
pub trait OutcomeRecorderPort: Send + Sync {
    /// One provider attempt finished
    fn record_attempt(&self, outcome: &RequestOutcome);

    /// A terminal fallback was served for `operation`
    fn record_degraded(&self, operation: Operation);

    /// A cached operation resolved its lookup, once per request
    fn record_cache_lookup(&self, operation: Operation, lookup: CacheLookup);
}
