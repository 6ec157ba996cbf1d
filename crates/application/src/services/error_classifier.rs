//! Error classifier
//!
//! Maps a provider error to an [`ErrorCategory`] by scanning its display text
//! for known wording. Provider adapters raise their own native errors; this is
//! the only place that interprets them.

use std::{fmt, sync::LazyLock};

use aho_corasick::AhoCorasick;
use domain::ErrorCategory;

/// A keyword and the category it indicates
struct ClassificationRule {
    pattern: &'static str,
    category: ErrorCategory,
}

const fn rule(pattern: &'static str, category: ErrorCategory) -> ClassificationRule {
    ClassificationRule { pattern, category }
}

static RULES: &[ClassificationRule] = &[
    rule("timeout", ErrorCategory::Transient),
    rule("timed out", ErrorCategory::Transient),
    rule("connection", ErrorCategory::Transient),
    rule("network", ErrorCategory::Transient),
    rule("temporary", ErrorCategory::Transient),
    rule("rate limit", ErrorCategory::Transient),
    rule("throttle", ErrorCategory::Transient),
    rule("service unavailable", ErrorCategory::ServiceUnavailable),
    rule("server error", ErrorCategory::ServiceUnavailable),
    rule("bad gateway", ErrorCategory::ServiceUnavailable),
    rule("502", ErrorCategory::ServiceUnavailable),
    rule("503", ErrorCategory::ServiceUnavailable),
    rule("504", ErrorCategory::ServiceUnavailable),
    rule("quota", ErrorCategory::QuotaExceeded),
    rule("limit exceeded", ErrorCategory::QuotaExceeded),
    rule("too many requests", ErrorCategory::QuotaExceeded),
    rule("429", ErrorCategory::QuotaExceeded),
    rule("unauthorized", ErrorCategory::Permanent),
    rule("forbidden", ErrorCategory::Permanent),
    rule("invalid", ErrorCategory::Permanent),
    rule("bad request", ErrorCategory::Permanent),
    rule("400", ErrorCategory::Permanent),
    rule("401", ErrorCategory::Permanent),
    rule("403", ErrorCategory::Permanent),
];

static MATCHER: LazyLock<AhoCorasick> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // Infallible with valid static patterns
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(RULES.iter().map(|r| r.pattern))
        .expect("classification patterns are valid")
});

/// Lower rank wins when an error matches several categories
const fn rank(category: ErrorCategory) -> u8 {
    match category {
        ErrorCategory::Transient => 0,
        ErrorCategory::ServiceUnavailable => 1,
        ErrorCategory::QuotaExceeded => 2,
        ErrorCategory::Permanent => 3,
    }
}

/// Classify an error message
///
/// Matching is case-insensitive. When no keyword matches the error is
/// considered transient.
pub fn classify_message(message: &str) -> ErrorCategory {
    MATCHER
        .find_overlapping_iter(message)
        .map(|m| RULES[m.pattern().as_usize()].category)
        .min_by_key(|category| rank(*category))
        .unwrap_or(ErrorCategory::Transient)
}

/// Classify any displayable error
pub fn classify<E: fmt::Display + ?Sized>(error: &E) -> ErrorCategory {
    classify_message(&error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_reference_messages() {
        assert_eq!(classify_message("Connection timeout"), ErrorCategory::Transient);
        assert_eq!(
            classify_message("401 Unauthorized: invalid API key"),
            ErrorCategory::Permanent
        );
        assert_eq!(
            classify_message("429 Too Many Requests"),
            ErrorCategory::QuotaExceeded
        );
        assert_eq!(
            classify_message("503 Service Unavailable"),
            ErrorCategory::ServiceUnavailable
        );
    }

    #[test]
    fn transient_wins_over_lower_priorities() {
        // "rate limit" is transient even though 429 signals quota
        assert_eq!(
            classify_message("429: rate limit reached"),
            ErrorCategory::Transient
        );
        assert_eq!(
            classify_message("504 Gateway Timeout"),
            ErrorCategory::Transient
        );
    }

    #[test]
    fn service_unavailable_wins_over_permanent() {
        assert_eq!(
            classify_message("502 bad gateway: invalid upstream response"),
            ErrorCategory::ServiceUnavailable
        );
    }

    #[test]
    fn quota_wins_over_permanent() {
        assert_eq!(
            classify_message("403 forbidden: monthly quota used"),
            ErrorCategory::QuotaExceeded
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(classify_message("FORBIDDEN"), ErrorCategory::Permanent);
        assert_eq!(classify_message("Network Unreachable"), ErrorCategory::Transient);
    }

    #[test]
    fn unknown_wording_defaults_to_transient() {
        assert_eq!(classify_message("something odd happened"), ErrorCategory::Transient);
        assert_eq!(classify_message(""), ErrorCategory::Transient);
    }

    #[test]
    fn classify_uses_display_text() {
        let err = std::io::Error::other("bad request: missing voice");
        assert_eq!(classify(&err), ErrorCategory::Permanent);
    }

    #[test]
    fn classify_accepts_boxed_errors() {
        let err: Box<dyn std::error::Error + Send + Sync> = "quota exhausted".into();
        assert_eq!(classify(&err), ErrorCategory::QuotaExceeded);
    }
}
