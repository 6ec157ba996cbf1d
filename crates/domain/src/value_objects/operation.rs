//! Operations routed through the orchestrator

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Group of operations served by the same kind of provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationFamily {
    /// Prompt in, text out
    TextGeneration,
    /// Text in, audio out
    SpeechSynthesis,
}

impl OperationFamily {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TextGeneration => "text_generation",
            Self::SpeechSynthesis => "speech_synthesis",
        }
    }
}

impl fmt::Display for OperationFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical request kind with its own provider priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Generate interview questions for a role
    QuestionGeneration,
    /// Score and critique a candidate answer
    AnswerAnalysis,
    /// Extract a role profile from a job description
    RoleAnalysis,
    /// Render text to audio
    SpeechSynthesis,
}

impl Operation {
    pub const ALL: [Self; 4] = [
        Self::QuestionGeneration,
        Self::AnswerAnalysis,
        Self::RoleAnalysis,
        Self::SpeechSynthesis,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::QuestionGeneration => "question_generation",
            Self::AnswerAnalysis => "answer_analysis",
            Self::RoleAnalysis => "role_analysis",
            Self::SpeechSynthesis => "speech_synthesis",
        }
    }

    /// The family of providers able to serve this operation
    #[must_use]
    pub const fn family(&self) -> OperationFamily {
        match self {
            Self::QuestionGeneration | Self::AnswerAnalysis | Self::RoleAnalysis => {
                OperationFamily::TextGeneration
            },
            Self::SpeechSynthesis => OperationFamily::SpeechSynthesis,
        }
    }

    /// All operations belonging to a family
    pub fn for_family(family: OperationFamily) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(move |op| op.family() == family)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == normalized)
            .ok_or_else(|| DomainError::UnknownOperation(s.to_string()))
    }
}
