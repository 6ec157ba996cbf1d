//! Value Objects - Immutable, identity-less domain primitives

mod audio_format;
mod error_category;
mod health_status;
mod operation;
mod provider_id;

pub use audio_format::AudioFormat;
pub use error_category::ErrorCategory;
pub use health_status::{CircuitState, HealthStatus};
pub use operation::{Operation, OperationFamily};
pub use provider_id::ProviderId;
