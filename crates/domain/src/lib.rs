//! Domain layer for the provider orchestrator
//!
//! Contains the vocabulary shared by every layer: provider identities,
//! operations, error categories, health states and the snapshots built
//! from them. This layer performs no I/O.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
