use async_trait::async_trait;
use rig::client::{EmbeddingsClient, ProviderClient};
use rig::embeddings::EmbeddingModel;
use rig::providers::{gemini, ollama, openai};

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};
use crate::infrastructure::config::{EmbeddingConfig, EmbeddingProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    OpenAi,
    Gemini,
    Ollama,
}

/// Embeddings served by a rig provider. Credentials and endpoints come from
/// the provider's own environment variables (`OPENAI_API_KEY`,
/// `GEMINI_API_KEY`, `OLLAMA_API_BASE_URL`).
pub struct TextEmbedding {
    provider: Provider,
    model: String,
    dimension: usize,
}

macro_rules! embed_with {
    ($client:expr, $model:expr, $texts:expr) => {{
        let model = $client.embedding_model($model);
        model
            .embed_texts($texts)
            .await
            .map_err(|e| DomainError::upstream(e.to_string()))?
    }};
}

impl TextEmbedding {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, DomainError> {
        let provider = match config.provider {
            EmbeddingProvider::OpenAi => Provider::OpenAi,
            EmbeddingProvider::Gemini => Provider::Gemini,
            EmbeddingProvider::Ollama => Provider::Ollama,
            EmbeddingProvider::Hashing => {
                return Err(DomainError::validation(
                    "hashing embeddings are not served by a remote provider",
                ))
            }
        };

        Ok(Self {
            provider,
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Embedding>, DomainError> {
        let embeddings = match self.provider {
            Provider::OpenAi => embed_with!(openai::Client::from_env(), &self.model, texts),
            Provider::Gemini => embed_with!(gemini::Client::from_env(), &self.model, texts),
            Provider::Ollama => embed_with!(ollama::Client::from_env(), &self.model, texts),
        };

        Ok(embeddings
            .into_iter()
            .map(|emb| Embedding::new(emb.vec.into_iter().map(|x| x as f32).collect()))
            .collect())
    }
}

#[async_trait]
impl EmbeddingService for TextEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        self.embed_texts(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::upstream("No embedding returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .embed_texts(texts.iter().map(|t| t.to_string()).collect())
            .await?;

        if embeddings.len() != texts.len() {
            return Err(DomainError::upstream(format!(
                "expected {} embeddings, provider returned {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}
