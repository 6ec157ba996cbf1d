//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Provider name does not match any known backend
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Operation name does not match any known operation
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Audio format is not supported
    #[error("Unsupported audio format: {0}")]
    UnsupportedAudioFormat(String),

    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl DomainError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}
