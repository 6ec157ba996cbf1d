//! Provider identity - Names an interchangeable backend

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::OperationFamily;
use crate::errors::DomainError;

/// Interchangeable backends the orchestrator can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Local Ollama inference engine
    Ollama,
    /// OpenAI chat completions
    OpenAi,
    /// Anthropic messages API
    Anthropic,
    /// Local Coqui TTS engine
    Coqui,
    /// ElevenLabs speech API
    ElevenLabs,
    /// PlayHT speech API
    PlayHt,
}

impl ProviderId {
    /// Every known provider, text providers first
    pub const ALL: [Self; 6] = [
        Self::Ollama,
        Self::OpenAi,
        Self::Anthropic,
        Self::Coqui,
        Self::ElevenLabs,
        Self::PlayHt,
    ];

    /// Stable lowercase name used in configuration, logs and metrics
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Coqui => "coqui",
            Self::ElevenLabs => "elevenlabs",
            Self::PlayHt => "playht",
        }
    }

    /// The operation family this provider can serve
    #[must_use]
    pub const fn family(&self) -> OperationFamily {
        match self {
            Self::Ollama | Self::OpenAi | Self::Anthropic => OperationFamily::TextGeneration,
            Self::Coqui | Self::ElevenLabs | Self::PlayHt => OperationFamily::SpeechSynthesis,
        }
    }

    /// All providers belonging to a family, in declaration order
    pub fn for_family(family: OperationFamily) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(move |p| p.family() == family)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" | "open_ai" | "open-ai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "coqui" | "coqui_tts" => Ok(Self::Coqui),
            "elevenlabs" | "eleven_labs" | "eleven-labs" => Ok(Self::ElevenLabs),
            "playht" | "play_ht" | "play.ht" | "play-ht" => Ok(Self::PlayHt),
            _ => Err(DomainError::UnknownProvider(s.to_string())),
        }
    }
}
