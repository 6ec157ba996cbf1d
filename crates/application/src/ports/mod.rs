//! Port definitions for application layer
//!
//! Ports are interfaces that define how the application interacts with
//! external systems. Adapters in the infrastructure layer implement these ports.

mod cache_port;
mod outcome_recorder_port;
mod speech_synthesis_port;
mod text_generation_port;

pub use cache_port::CachePort;
#[cfg(test)]
pub use outcome_recorder_port::MockOutcomeRecorderPort;
pub use outcome_recorder_port::{CacheLookup, OutcomeRecorderPort};
#[cfg(test)]
pub use speech_synthesis_port::MockSpeechSynthesisPort;
pub use speech_synthesis_port::SpeechSynthesisPort;
#[cfg(test)]
pub use text_generation_port::MockTextGenerationPort;
pub use text_generation_port::TextGenerationPort;

/// Native error raised by a provider adapter
///
/// The orchestrator never inspects the concrete type; failures are
/// normalized by the error classifier from their display text.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;
