//! Explanation service backed by an LLM provider

use super::ExplanationService;
use crate::config::ExplanationConfig;
use crate::error::{ExplanationError, Result};
use async_trait::async_trait;
use rebalancer_llm::providers::{OpenAIConfig, OpenAIProvider};
use rebalancer_llm::{CompletionRequest, LLMProvider, Message, StopReason};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Asks a chat model to justify recommended trades
///
/// Each request carries the configured advisor persona as the system message
/// and the trade instruction as the single user message.
pub struct LlmExplainer {
    provider: Arc<dyn LLMProvider>,
    config: ExplanationConfig,
}

impl LlmExplainer {
    /// Create an explainer over any provider
    pub fn new(provider: Arc<dyn LLMProvider>, config: ExplanationConfig) -> Self {
        Self { provider, config }
    }

    /// Create an explainer talking to an OpenAI-compatible endpoint
    pub fn openai(openai: OpenAIConfig, config: ExplanationConfig) -> Result<Self> {
        let provider = OpenAIProvider::with_config(openai)?;
        Ok(Self::new(Arc::new(provider), config))
    }

    pub fn config(&self) -> &ExplanationConfig {
        &self.config
    }

    fn build_request(&self, prompt: &str) -> CompletionRequest {
        CompletionRequest::builder(&self.config.model)
            .system(&self.config.system_prompt)
            .add_message(Message::user(prompt))
            .max_tokens(self.config.max_tokens)
            .temperature(self.config.temperature)
            .build()
    }
}

#[async_trait]
impl ExplanationService for LlmExplainer {
    #[instrument(
        skip(self, prompt),
        fields(provider = self.provider.name(), model = %self.config.model)
    )]
    async fn explain(&self, prompt: &str) -> std::result::Result<String, ExplanationError> {
        let response = self.provider.complete(self.build_request(prompt)).await?;

        if response.stop_reason == StopReason::MaxTokens {
            debug!("Explanation truncated at {} tokens", self.config.max_tokens);
        }
        debug!(tokens = response.usage.total(), "Explanation received");

        response
            .message
            .text()
            .map(str::to_string)
            .ok_or(ExplanationError::EmptyResponse)
    }
}
