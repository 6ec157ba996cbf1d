//! Orchestrator assembly from configuration
//!
//! The host process constructs whichever provider adapters it can (missing
//! credentials, unreachable local models) and hands them over here. Routes are
//! narrowed to the available providers, with a warning for each one dropped.

use std::{collections::BTreeMap, sync::Arc};

use application::{
    ApplicationError, CachePort, OutcomeRecorderPort, ResultCache, SpeechOrchestrator,
    SpeechSynthesisPort, TextGenerationPort, TextOrchestrator,
};
use domain::{Operation, ProviderId};
use tracing::{info, warn};

use crate::{
    cache::MokaCache,
    config::{AppConfig, CacheAppConfig},
};

/// Keep only providers that were constructed, warning about the rest
fn available_route<P: ?Sized>(
    operation: Operation,
    order: Vec<ProviderId>,
    providers: &BTreeMap<ProviderId, Arc<P>>,
) -> Vec<ProviderId> {
    order
        .into_iter()
        .filter(|provider| {
            let available = providers.contains_key(provider);
            if !available {
                warn!(%operation, %provider, "Provider unavailable, removed from route");
            }
            available
        })
        .collect()
}

/// Build the shared result store when caching is enabled
pub fn build_cache_store(config: &CacheAppConfig) -> Option<Arc<dyn CachePort>> {
    config.enabled.then(|| {
        info!(
            ttl_secs = config.ttl_secs,
            max_capacity_mb = config.max_capacity_mb,
            "Result cache enabled"
        );
        Arc::new(MokaCache::with_config(config.to_moka_config())) as Arc<dyn CachePort>
    })
}

/// Build the text generation orchestrator from configuration
pub fn build_text_orchestrator(
    config: &AppConfig,
    providers: impl IntoIterator<Item = (ProviderId, Arc<dyn TextGenerationPort>)>,
    recorder: Option<Arc<dyn OutcomeRecorderPort>>,
) -> Result<TextOrchestrator, ApplicationError> {
    let providers: BTreeMap<_, _> = providers.into_iter().collect();
    let mut builder = TextOrchestrator::builder(config.text_orchestrator_config()?);

    for (operation, order) in config.text_generation.routes()? {
        builder = builder.route(operation, available_route(operation, order, &providers));
    }
    for (provider, port) in providers {
        builder = builder.provider(provider, port);
    }
    if config.text_generation.fallback_enabled {
        builder = builder.standard_fallbacks();
    }
    if let Some(recorder) = recorder {
        builder = builder.recorder(recorder);
    }
    builder.build()
}

/// Build the speech synthesis orchestrator from configuration
///
/// Results are cached when `store` is given and caching is enabled.
pub fn build_speech_orchestrator(
    config: &AppConfig,
    providers: impl IntoIterator<Item = (ProviderId, Arc<dyn SpeechSynthesisPort>)>,
    store: Option<Arc<dyn CachePort>>,
    recorder: Option<Arc<dyn OutcomeRecorderPort>>,
) -> Result<SpeechOrchestrator, ApplicationError> {
    let providers: BTreeMap<_, _> = providers.into_iter().collect();
    let operation = Operation::SpeechSynthesis;
    let route = available_route(operation, config.speech.route()?, &providers);

    let mut builder =
        SpeechOrchestrator::builder(config.speech_orchestrator_config()?).route(operation, route);
    for (provider, port) in providers {
        builder = builder.provider(provider, port);
    }

    if let Some(store) = store.filter(|_| config.cache.enabled) {
        let fingerprint = config.speech.cache_fingerprint()?;
        let settings: Vec<&str> = fingerprint.iter().map(String::as_str).collect();
        let cache = ResultCache::new(store, config.cache.ttl()).with_settings(&settings);
        builder = builder.cache(Arc::new(cache), [operation]);
    }
    if let Some(recorder) = recorder {
        builder = builder.recorder(recorder);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use application::ProviderError;
    use async_trait::async_trait;

    use super::*;

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl TextGenerationPort for Echo {
        async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String, ProviderError> {
            Ok(prompt.to_string())
        }
    }

    #[test]
    fn unavailable_providers_are_dropped_from_routes() {
        let config = AppConfig::default();
        let orch = build_text_orchestrator(
            &config,
            [(ProviderId::OpenAi, Arc::new(Echo) as Arc<dyn TextGenerationPort>)],
            None,
        )
        .unwrap();

        assert_eq!(
            orch.priority_order(Operation::QuestionGeneration),
            Some(&[ProviderId::OpenAi][..])
        );
        assert!(orch.get_health(ProviderId::Ollama).is_none());
    }

    #[test]
    fn cache_store_follows_enabled_flag() {
        assert!(build_cache_store(&CacheAppConfig::default()).is_some());
        let disabled = CacheAppConfig {
            enabled: false,
            ..CacheAppConfig::default()
        };
        assert!(build_cache_store(&disabled).is_none());
    }
}
