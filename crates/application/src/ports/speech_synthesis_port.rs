//! Speech synthesis port - Capability interface for text-to-speech providers

use async_trait::async_trait;
use domain::AudioFormat;
#[cfg(test)]
use mockall::automock;

use super::ProviderError;

/// Port implemented by every text-to-speech provider adapter
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechSynthesisPort: Send + Sync {
    /// Render `text` with `voice`, returning encoded audio bytes
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        format: AudioFormat,
    ) -> Result<Vec<u8>, ProviderError>;

    /// Cheap liveness probe
    async fn health_check(&self) -> bool {
        true
    }
}
