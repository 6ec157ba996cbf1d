//! Application services - Resilience primitives and the orchestrator

pub mod circuit_breaker;
pub mod error_classifier;
pub mod fallback_chain;
pub mod fallback_responses;
pub mod health_registry;
pub mod orchestrator;
pub mod result_cache;
pub mod retry_policy;
pub mod single_flight;
pub mod speech_synthesis;
pub mod text_generation;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use error_classifier::{classify, classify_message};
pub use fallback_chain::{FallbackChain, FallbackChainSelector};
pub use health_registry::HealthRegistry;
pub use orchestrator::{
    DEFAULT_CALL_TIMEOUT, Orchestrated, Orchestrator, OrchestratorBuilder, OrchestratorConfig,
    ProviderFamily, TerminalFallback,
};
pub use result_cache::{
    CacheEntry, ResultCache, ResultCacheStats, generate_cache_key, normalize_text,
};
pub use retry_policy::{RetryPolicies, RetryPolicy};
pub use single_flight::{FlightGuard, SingleFlight};
pub use speech_synthesis::{
    MAX_TEXT_CHARS, SpeechOrchestrator, SpeechRequest, SpeechSynthesis, SynthesizedAudio,
};
pub use text_generation::{TextGeneration, TextOrchestrator, TextRequest};
