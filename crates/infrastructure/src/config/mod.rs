//! Application configuration
//!
//! Split into focused sub-modules by concern:
//! - `resilience`: Circuit breakers, retry policies, call timeouts
//! - `providers`: Text generation and speech provider routing
//! - `cache`: Result cache sizing and TTL
//!
//! Values come from an optional `config.toml`, overridden by environment
//! variables such as `ORCHESTRATOR_RESILIENCE__CALL_TIMEOUT_SECS`.

mod cache;
mod providers;
mod resilience;

use std::{collections::BTreeMap, time::Duration};

use application::{ApplicationError, OrchestratorConfig};
use domain::{OperationFamily, ProviderId};
use serde::{Deserialize, Serialize};

pub use cache::CacheAppConfig;
pub use providers::{SpeechAppConfig, TextGenerationAppConfig};
pub use resilience::{
    BreakerAppConfig, ResilienceAppConfig, RetryAppConfig, RetryPolicyAppConfig,
};

use crate::telemetry::TelemetryConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ORCHESTRATOR";

/// Separator between nested keys in environment variable names
pub const ENV_SEPARATOR: &str = "__";

/// Shared default for boolean `true` fields across config structs
pub(crate) const fn default_true() -> bool {
    true
}

/// Parse provider names, requiring each to belong to `family`
pub(crate) fn parse_providers(
    names: &[String],
    family: OperationFamily,
    setting: &str,
) -> Result<Vec<ProviderId>, ApplicationError> {
    names
        .iter()
        .map(|name| parse_provider(name, family, setting))
        .collect()
}

pub(crate) fn parse_provider(
    name: &str,
    family: OperationFamily,
    setting: &str,
) -> Result<ProviderId, ApplicationError> {
    let provider: ProviderId = name
        .parse()
        .map_err(|e| ApplicationError::Configuration(format!("{setting}: {e}")))?;
    if provider.family() != family {
        return Err(ApplicationError::Configuration(format!(
            "{setting}: provider {provider} does not serve {family}"
        )));
    }
    Ok(provider)
}

/// Per-provider timeouts in seconds, keyed by provider name
pub(crate) fn parse_timeouts(
    timeouts: &BTreeMap<String, u64>,
    family: OperationFamily,
    setting: &str,
) -> Result<Vec<(ProviderId, Duration)>, ApplicationError> {
    timeouts
        .iter()
        .map(|(name, secs)| {
            if *secs == 0 {
                return Err(ApplicationError::Configuration(format!(
                    "{setting}.{name}: timeout must be positive"
                )));
            }
            Ok((parse_provider(name, family, setting)?, Duration::from_secs(*secs)))
        })
        .collect()
}

/// Main application configuration
///
/// Every section has defaults, so an empty configuration is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Circuit breakers, retries and timeouts
    #[serde(default)]
    pub resilience: ResilienceAppConfig,

    /// Text generation routing
    #[serde(default)]
    pub text_generation: TextGenerationAppConfig,

    /// Speech synthesis routing and voice defaults
    #[serde(default)]
    pub speech: SpeechAppConfig,

    /// Result cache
    #[serde(default)]
    pub cache: CacheAppConfig,

    /// Logging
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from `config.toml` (if present) and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (e.g., ORCHESTRATOR_CACHE__TTL_SECS)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(ENV_SEPARATOR)
                    .list_separator(",")
                    .with_list_parse_key("text_generation.priority")
                    .with_list_parse_key("speech.priority")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Parse configuration from a TOML document
    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Resilience settings for the text generation orchestrator
    pub fn text_orchestrator_config(&self) -> Result<OrchestratorConfig, ApplicationError> {
        let timeouts = self.text_generation.provider_timeouts()?;
        self.resilience
            .orchestrator_config(OperationFamily::TextGeneration, timeouts)
    }

    /// Resilience settings for the speech synthesis orchestrator
    pub fn speech_orchestrator_config(&self) -> Result<OrchestratorConfig, ApplicationError> {
        let timeouts = self.speech.provider_timeouts()?;
        self.resilience
            .orchestrator_config(OperationFamily::SpeechSynthesis, timeouts)
    }
}

#[cfg(test)]
mod tests {
    use domain::Operation;

    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.resilience.call_timeout_secs, 30);
        assert_eq!(config.resilience.circuit_breaker.failure_threshold, 5);
        assert!(config.text_generation.fallback_enabled);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 3600);
    }

    #[test]
    fn sections_override_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [resilience]
            call_timeout_secs = 10

            [resilience.circuit_breaker]
            failure_threshold = 2
            recovery_timeout_secs = 15

            [resilience.retry.transient]
            max_retries = 1

            [text_generation]
            priority = ["anthropic", "openai"]
            fallback_enabled = false

            [text_generation.provider_timeouts_secs]
            ollama = 90

            [speech]
            priority = ["playht"]
            default_voice = "nova"
            "#,
        )
        .unwrap();

        let text = config.text_orchestrator_config().unwrap();
        assert_eq!(text.call_timeout, Duration::from_secs(10));
        assert_eq!(text.circuit_breaker.failure_threshold, 2);
        assert_eq!(text.circuit_breaker.recovery_timeout, Duration::from_secs(15));
        assert_eq!(
            text.retry.for_category(domain::ErrorCategory::Transient).max_retries,
            1
        );
        assert_eq!(
            text.provider_timeouts.get(&ProviderId::Ollama),
            Some(&Duration::from_secs(90))
        );

        let routes = config.text_generation.routes().unwrap();
        assert_eq!(
            routes[&Operation::QuestionGeneration],
            vec![ProviderId::Anthropic, ProviderId::OpenAi]
        );
        assert!(!config.text_generation.fallback_enabled);
        assert_eq!(config.speech.default_voice, "nova");
    }

    #[test]
    fn provider_from_wrong_family_is_rejected() {
        let err = parse_provider("coqui", OperationFamily::TextGeneration, "priority").unwrap_err();
        assert!(err.to_string().contains("coqui"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = parse_providers(
            &["ollama".to_string(), "mistral".to_string()],
            OperationFamily::TextGeneration,
            "text_generation.priority",
        )
        .unwrap_err();
        assert!(matches!(err, ApplicationError::Configuration(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let timeouts = BTreeMap::from([("openai".to_string(), 0)]);
        assert!(
            parse_timeouts(&timeouts, OperationFamily::TextGeneration, "timeouts").is_err()
        );
    }
}
