//! Speech synthesis family
//!
//! Text-to-speech runs against [`SpeechSynthesisPort`] providers. Results are
//! cacheable: the key covers the normalized text, the voice and the format.

use domain::{AudioFormat, DomainError, Operation, OperationFamily, ProviderId};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::{
    orchestrator::{Orchestrated, Orchestrator, ProviderFamily},
    result_cache::normalize_text,
};
use crate::{
    error::ApplicationError,
    ports::{ProviderError, SpeechSynthesisPort},
};

/// Longest text accepted for one synthesis request, in characters
pub const MAX_TEXT_CHARS: usize = 5000;

/// Validated speech synthesis request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    text: String,
    voice: String,
    format: AudioFormat,
}

impl SpeechRequest {
    pub fn new(
        text: impl Into<String>,
        voice: impl Into<String>,
        format: AudioFormat,
    ) -> Result<Self, DomainError> {
        let text = text.into();
        let voice = voice.into().trim().to_string();

        if text.trim().is_empty() {
            return Err(DomainError::validation("text must not be blank"));
        }
        let chars = text.chars().count();
        if chars > MAX_TEXT_CHARS {
            return Err(DomainError::validation(format!(
                "text is {chars} characters, limit is {MAX_TEXT_CHARS}"
            )));
        }
        if voice.is_empty() {
            return Err(DomainError::validation("voice must not be blank"));
        }

        Ok(Self {
            text,
            voice,
            format,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub const fn format(&self) -> AudioFormat {
        self.format
    }
}

/// Encoded audio produced by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedAudio {
    #[serde(with = "base64_bytes")]
    pub audio: Vec<u8>,
    pub format: AudioFormat,
    pub voice: String,
}

impl SynthesizedAudio {
    pub fn len(&self) -> usize {
        self.audio.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_empty()
    }

    pub const fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Marker for the speech synthesis family
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeechSynthesis;

impl ProviderFamily for SpeechSynthesis {
    type Port = dyn SpeechSynthesisPort;
    type Request = SpeechRequest;
    type Output = SynthesizedAudio;

    const FAMILY: OperationFamily = OperationFamily::SpeechSynthesis;

    fn invoke<'a>(
        port: &'a Self::Port,
        request: &'a Self::Request,
    ) -> BoxFuture<'a, Result<Self::Output, ProviderError>> {
        Box::pin(async move {
            let audio = port
                .synthesize(&request.text, &request.voice, request.format)
                .await?;
            if audio.is_empty() {
                return Err("provider returned an empty audio payload (invalid response)".into());
            }
            Ok(SynthesizedAudio {
                audio,
                format: request.format,
                voice: request.voice.clone(),
            })
        })
    }

    fn health_check(port: &Self::Port) -> BoxFuture<'_, bool> {
        port.health_check()
    }

    fn cache_components(request: &Self::Request) -> Option<Vec<String>> {
        Some(vec![
            normalize_text(&request.text),
            request.voice.clone(),
            request.format.as_str().to_string(),
        ])
    }
}

pub type SpeechOrchestrator = Orchestrator<SpeechSynthesis>;

impl Orchestrator<SpeechSynthesis> {
    /// Validate and synthesize `text`, serving cached audio when available
    pub async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        format: AudioFormat,
        preferred: Option<ProviderId>,
    ) -> Result<Orchestrated<SynthesizedAudio>, ApplicationError> {
        let request = SpeechRequest::new(text, voice, format)?;
        self.execute(Operation::SpeechSynthesis, &request, preferred)
            .await
    }
}
