//! Application-level errors

use domain::{DomainError, Operation, OperationFamily};
use thiserror::Error;

/// Errors that can occur in the application layer
///
/// Provider failures never appear here: they are absorbed by retries and
/// fallback chains. Callers only see the outcome of the whole orchestration.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Every provider failed and no terminal fallback is registered
    #[error("Service unavailable: no provider could serve {operation}")]
    ServiceUnavailable { operation: Operation },

    /// The orchestrator was asked for an operation it does not route
    #[error("Operation {operation} is not routed by the {family} orchestrator")]
    UnroutedOperation {
        operation: Operation,
        family: OperationFamily,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cache backend error
    #[error("Cache error: {0}")]
    Cache(String),
}
