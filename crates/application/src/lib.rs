//! Application layer - Provider resilience and orchestration
//!
//! Contains the port definitions provider adapters implement and the services
//! that classify failures, schedule retries, gate providers behind circuit
//! breakers and execute requests along ordered fallback chains.

pub mod error;
pub mod ports;
pub mod services;

pub use error::ApplicationError;
pub use ports::*;
pub use services::*;
