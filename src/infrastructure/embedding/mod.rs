mod hashing;
mod text;

pub use hashing::HashingEmbedding;
pub use text::TextEmbedding;

use std::sync::Arc;

use crate::domain::{ports::EmbeddingService, Result};
use crate::infrastructure::config::{EmbeddingConfig, EmbeddingProvider};

pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingService>> {
    Ok(match config.provider {
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedding::new(config.dimension)),
        _ => Arc::new(TextEmbedding::from_config(config)?),
    })
}
