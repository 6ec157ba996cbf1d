//! Provider routing configurations: Text generation and Speech synthesis.

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use application::ApplicationError;
use domain::{AudioFormat, Operation, OperationFamily, ProviderId};
use serde::{Deserialize, Serialize};

use super::{default_true, parse_providers, parse_timeouts};

// ==============================
// Text Generation Configuration
// ==============================

/// Text generation routing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextGenerationAppConfig {
    /// Provider order shared by every text operation
    #[serde(default = "default_text_priority")]
    pub priority: Vec<String>,

    /// Provider order per operation name; replaces `priority` for that operation
    #[serde(default)]
    pub operation_priority: BTreeMap<String, Vec<String>>,

    /// Call timeout per provider name in seconds
    #[serde(default)]
    pub provider_timeouts_secs: BTreeMap<String, u64>,

    /// Serve canned responses when every provider fails
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
}

fn default_text_priority() -> Vec<String> {
    vec!["ollama".into(), "openai".into(), "anthropic".into()]
}

impl Default for TextGenerationAppConfig {
    fn default() -> Self {
        Self {
            priority: default_text_priority(),
            operation_priority: BTreeMap::new(),
            provider_timeouts_secs: BTreeMap::new(),
            fallback_enabled: true,
        }
    }
}

impl TextGenerationAppConfig {
    /// Priority order for every text operation
    pub fn routes(&self) -> Result<HashMap<Operation, Vec<ProviderId>>, ApplicationError> {
        let family = OperationFamily::TextGeneration;
        let shared = parse_providers(&self.priority, family, "text_generation.priority")?;

        let mut routes: HashMap<Operation, Vec<ProviderId>> = Operation::for_family(family)
            .map(|operation| (operation, shared.clone()))
            .collect();

        for (name, order) in &self.operation_priority {
            let setting = format!("text_generation.operation_priority.{name}");
            let operation: Operation = name
                .parse()
                .map_err(|e| ApplicationError::Configuration(format!("{setting}: {e}")))?;
            if operation.family() != family {
                return Err(ApplicationError::Configuration(format!(
                    "{setting}: {operation} is not a text operation"
                )));
            }
            routes.insert(operation, parse_providers(order, family, &setting)?);
        }
        Ok(routes)
    }

    pub fn provider_timeouts(&self) -> Result<HashMap<ProviderId, Duration>, ApplicationError> {
        Ok(parse_timeouts(
            &self.provider_timeouts_secs,
            OperationFamily::TextGeneration,
            "text_generation.provider_timeouts_secs",
        )?
        .into_iter()
        .collect())
    }
}

// ==============================
// Speech Configuration
// ==============================

/// Speech synthesis routing and voice defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechAppConfig {
    /// Provider order for speech synthesis
    #[serde(default = "default_speech_priority")]
    pub priority: Vec<String>,

    /// Voice used when a request does not name one
    #[serde(default = "default_voice")]
    pub default_voice: String,

    /// Audio format used when a request does not name one
    #[serde(default = "default_format")]
    pub default_format: String,

    /// Bump to invalidate every cached audio clip
    #[serde(default = "default_voice_settings_version")]
    pub voice_settings_version: String,

    /// Call timeout per provider name in seconds
    #[serde(default)]
    pub provider_timeouts_secs: BTreeMap<String, u64>,
}

fn default_speech_priority() -> Vec<String> {
    vec!["coqui".into(), "elevenlabs".into(), "playht".into()]
}

fn default_voice() -> String {
    "default".to_string()
}

fn default_format() -> String {
    "mp3".to_string()
}

fn default_voice_settings_version() -> String {
    "1".to_string()
}

impl Default for SpeechAppConfig {
    fn default() -> Self {
        Self {
            priority: default_speech_priority(),
            default_voice: default_voice(),
            default_format: default_format(),
            voice_settings_version: default_voice_settings_version(),
            provider_timeouts_secs: BTreeMap::new(),
        }
    }
}

impl SpeechAppConfig {
    pub fn route(&self) -> Result<Vec<ProviderId>, ApplicationError> {
        parse_providers(
            &self.priority,
            OperationFamily::SpeechSynthesis,
            "speech.priority",
        )
    }

    pub fn format(&self) -> Result<AudioFormat, ApplicationError> {
        self.default_format.parse().map_err(|e| {
            ApplicationError::Configuration(format!("speech.default_format: {e}"))
        })
    }

    pub fn provider_timeouts(&self) -> Result<HashMap<ProviderId, Duration>, ApplicationError> {
        Ok(parse_timeouts(
            &self.provider_timeouts_secs,
            OperationFamily::SpeechSynthesis,
            "speech.provider_timeouts_secs",
        )?
        .into_iter()
        .collect())
    }

    /// Settings folded into every speech cache key
    pub fn cache_fingerprint(&self) -> Result<[String; 3], ApplicationError> {
        Ok([
            self.voice_settings_version.clone(),
            self.default_voice.trim().to_string(),
            self.format()?.as_str().to_string(),
        ])
    }
}
