//! Prompt assembly over retrieval results and answer generation.

use std::sync::Arc;

use insight_core::{AppError, AppResult, LlmSettings};
use insight_llm::{LlmClient, LlmRequest};
use insight_prompt::{BuiltPrompt, PromptTemplate};

use crate::rag::types::Answer;
use crate::types::RetrievalResult;

/// Render `template` with the question and the retrieved chunk texts, in
/// retrieval order.
pub fn assemble(
    question: &str,
    retrieval: &RetrievalResult,
    template: &PromptTemplate,
) -> AppResult<BuiltPrompt> {
    insight_prompt::assemble(question, retrieval.texts().as_slice(), template)
}

/// Sends assembled prompts to a language model.
#[derive(Clone)]
pub struct Answerer {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl Answerer {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Model and sampling options from the `llm` config section.
    pub fn from_settings(client: Arc<dyn LlmClient>, settings: &LlmSettings) -> Self {
        Self {
            client,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate an answer for an assembled prompt.
    ///
    /// One request, no retries. Whatever goes wrong is reported as
    /// `AppError::Generation`.
    pub async fn answer(&self, prompt: &BuiltPrompt, retrieval: RetrievalResult) -> AppResult<Answer> {
        let mut request = LlmRequest::new(prompt.user.clone(), self.model.clone());
        if let Some(system) = &prompt.system {
            request = request.with_system(system.clone());
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        tracing::debug!(
            "Generating answer with {} (model: {}, {} context passages)",
            self.client.provider_name(),
            self.model,
            prompt.metadata.context_passages
        );

        let response = self.client.complete(&request).await.map_err(|e| match e {
            AppError::Generation(_) => e,
            other => AppError::Generation(other.to_string()),
        })?;

        tracing::info!(
            "Generated answer ({} prompt tokens, {} completion tokens)",
            response.usage.prompt_tokens,
            response.usage.completion_tokens
        );

        Ok(Answer {
            text: response.content,
            retrieval,
            model: response.model,
            prompt_id: prompt.metadata.source_prompt_id.clone(),
        })
    }
}

impl std::fmt::Debug for Answerer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Answerer")
            .field("provider", &self.client.provider_name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
