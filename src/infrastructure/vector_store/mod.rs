mod local;
mod qdrant;

pub use local::{LocalVectorIndex, LocalVectorStore};
pub use qdrant::{QdrantIndex, QdrantVectorStore};

use std::sync::Arc;

use crate::domain::{ports::VectorIndexStore, Result};
use crate::infrastructure::config::{Config, VectorBackend};

pub fn from_config(config: &Config, embedding_model: &str) -> Result<Arc<dyn VectorIndexStore>> {
    Ok(match config.index.backend {
        VectorBackend::Local => Arc::new(LocalVectorStore::new(&config.index.dir, embedding_model)),
        VectorBackend::Qdrant => Arc::new(QdrantVectorStore::new(
            &config.index.qdrant_url,
            config.embedding.dimension,
            embedding_model,
        )?),
    })
}
