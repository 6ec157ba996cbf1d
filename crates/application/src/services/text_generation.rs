//! Text generation family
//!
//! Question generation, answer analysis and role analysis all run against
//! [`TextGenerationPort`] providers and produce raw model text.

use domain::{DomainError, Operation, OperationFamily, ProviderId};
use futures::future::BoxFuture;

use super::{
    fallback_responses,
    orchestrator::{Orchestrated, Orchestrator, OrchestratorBuilder, ProviderFamily},
};
use crate::{
    error::ApplicationError,
    ports::{ProviderError, TextGenerationPort},
};

/// Text generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRequest {
    pub prompt: String,
    pub max_tokens: u32,
    /// Job role the request is about; used by canned fallbacks
    pub role: Option<String>,
    /// Number of items requested; used by canned fallbacks
    pub count: Option<usize>,
}

impl TextRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            role: None,
            count: None,
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    #[must_use]
    pub const fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

/// Marker for the text generation family
#[derive(Debug, Clone, Copy, Default)]
pub struct TextGeneration;

impl ProviderFamily for TextGeneration {
    type Port = dyn TextGenerationPort;
    type Request = TextRequest;
    type Output = String;

    const FAMILY: OperationFamily = OperationFamily::TextGeneration;

    fn invoke<'a>(
        port: &'a Self::Port,
        request: &'a Self::Request,
    ) -> BoxFuture<'a, Result<Self::Output, ProviderError>> {
        port.generate(&request.prompt, request.max_tokens)
    }

    fn health_check(port: &Self::Port) -> BoxFuture<'_, bool> {
        port.health_check()
    }
}

pub type TextOrchestrator = Orchestrator<TextGeneration>;

impl Orchestrator<TextGeneration> {
    /// Generate text for `operation`, rejecting blank prompts up front
    pub async fn generate(
        &self,
        operation: Operation,
        request: &TextRequest,
        preferred: Option<ProviderId>,
    ) -> Result<Orchestrated<String>, ApplicationError> {
        if request.prompt.trim().is_empty() {
            return Err(DomainError::validation("prompt must not be blank").into());
        }
        self.execute(operation, request, preferred).await
    }
}

impl OrchestratorBuilder<TextGeneration> {
    /// Register the canned fallbacks for every routed text operation
    #[must_use]
    pub fn standard_fallbacks(self) -> Self {
        let mut builder = self;
        if builder.is_routed(Operation::QuestionGeneration) {
            builder = builder.fallback(
                Operation::QuestionGeneration,
                fallback_responses::question_generation,
            );
        }
        if builder.is_routed(Operation::AnswerAnalysis) {
            builder = builder.fallback(
                Operation::AnswerAnalysis,
                fallback_responses::answer_analysis,
            );
        }
        if builder.is_routed(Operation::RoleAnalysis) {
            builder = builder.fallback(Operation::RoleAnalysis, fallback_responses::role_analysis);
        }
        builder
    }
}
