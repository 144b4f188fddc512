use async_trait::async_trait;
use futures::StreamExt;
use rig::agent::{MultiTurnStreamItem, StreamingResult};
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::{anthropic, gemini, ollama, openai};
use rig::streaming::{StreamedAssistantContent, StreamingPrompt};

use crate::domain::ports::{LlmService, TextStream};
use crate::domain::DomainError;
use crate::infrastructure::config::{LlmConfig, LlmProvider};

const MAX_TOKENS: u64 = 2048;

macro_rules! prompt_with {
    ($client:expr, $model:expr, $system:expr, $prompt:expr) => {{
        let agent = $client
            .agent($model)
            .preamble($system)
            .max_tokens(MAX_TOKENS)
            .build();
        agent
            .prompt($prompt)
            .await
            .map_err(|e| DomainError::upstream(e.to_string()))
    }};
}

macro_rules! stream_with {
    ($client:expr, $model:expr, $system:expr, $prompt:expr) => {{
        let agent = $client
            .agent($model)
            .preamble($system)
            .max_tokens(MAX_TOKENS)
            .build();
        text_fragments(agent.stream_prompt($prompt).await)
    }};
}

/// Keeps only assistant text deltas. Reasoning, tool and usage items are dropped.
fn text_fragments<R>(stream: StreamingResult<R>) -> TextStream
where
    R: Send + 'static,
{
    Box::pin(stream.filter_map(|item| async move {
        match item {
            Ok(MultiTurnStreamItem::StreamAssistantItem(StreamedAssistantContent::Text(text))) => {
                (!text.text.is_empty()).then_some(Ok(text.text))
            }
            Ok(_) => None,
            Err(e) => Some(Err(DomainError::upstream(e.to_string()))),
        }
    }))
}

/// Chat completion through a rig provider. API keys and endpoints are read by
/// rig from the provider's standard environment variables.
pub struct RigLlm {
    provider: LlmProvider,
    model: String,
}

impl RigLlm {
    pub fn new(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.provider, config.model.clone())
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmService for RigLlm {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, DomainError> {
        let model = self.model.as_str();
        match self.provider {
            LlmProvider::OpenAi => prompt_with!(openai::Client::from_env(), model, system, prompt),
            LlmProvider::Anthropic => {
                prompt_with!(anthropic::Client::from_env(), model, system, prompt)
            }
            LlmProvider::Gemini => prompt_with!(gemini::Client::from_env(), model, system, prompt),
            LlmProvider::Ollama => prompt_with!(ollama::Client::from_env(), model, system, prompt),
        }
    }

    async fn complete_stream(&self, system: &str, prompt: &str) -> Result<TextStream, DomainError> {
        let model = self.model.as_str();
        let stream = match self.provider {
            LlmProvider::OpenAi => stream_with!(openai::Client::from_env(), model, system, prompt),
            LlmProvider::Anthropic => {
                stream_with!(anthropic::Client::from_env(), model, system, prompt)
            }
            LlmProvider::Gemini => stream_with!(gemini::Client::from_env(), model, system, prompt),
            LlmProvider::Ollama => stream_with!(ollama::Client::from_env(), model, system, prompt),
        };
        Ok(stream)
    }
}
