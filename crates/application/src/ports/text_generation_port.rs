//! Text generation port - Capability interface for text providers

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::ProviderError;

/// Port implemented by every text-generation provider adapter
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TextGenerationPort: Send + Sync {
    /// Generate a completion for `prompt`, bounded by `max_tokens`
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError>;

    /// Cheap liveness probe
    async fn health_check(&self) -> bool {
        true
    }
}
