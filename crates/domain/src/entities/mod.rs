//! Entities - Snapshots and records produced while orchestrating provider calls

mod request_outcome;
mod service_health;

pub use request_outcome::RequestOutcome;
pub use service_health::ServiceHealth;
