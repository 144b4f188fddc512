use crate::domain::errors::DomainError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};

/// Ordered, finite, non-restartable sequence of answer fragments.
pub type TextStream = BoxStream<'static, Result<String, DomainError>>;

#[async_trait]
pub trait LlmService: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, DomainError>;

    /// Providers without incremental output yield the whole completion as one fragment.
    async fn complete_stream(&self, system: &str, prompt: &str) -> Result<TextStream, DomainError> {
        let answer = self.complete(system, prompt).await?;
        Ok(Box::pin(stream::once(async move { Ok(answer) })))
    }
}
