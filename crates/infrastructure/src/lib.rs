//! Infrastructure layer - Configuration, adapters and assembly
//!
//! Implements ports defined in the application layer and builds the
//! orchestrators from configuration.

pub mod adapters;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod telemetry;

pub use adapters::*;
pub use bootstrap::{build_cache_store, build_speech_orchestrator, build_text_orchestrator};
pub use cache::{MokaCache, MokaCacheConfig};
pub use config::{
    AppConfig, BreakerAppConfig, CacheAppConfig, ResilienceAppConfig, RetryAppConfig,
    RetryPolicyAppConfig, SpeechAppConfig, TextGenerationAppConfig,
};
pub use telemetry::{TelemetryConfig, TelemetryError, init_telemetry};
