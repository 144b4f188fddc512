pub mod config;
pub mod embedding;
pub mod llm;
pub mod loader;
pub mod vector_store;

pub use config::{AppConfig, AppMode, Config, LogFormat, PromptsConfig};
pub use embedding::{HashingEmbedding, TextEmbedding};
pub use llm::RigLlm;
pub use loader::FsDocumentLoader;
pub use vector_store::{LocalVectorStore, QdrantVectorStore};

use std::sync::Arc;

use crate::application::{Assistant, IndexService};
use crate::domain::{ports::LlmService, Result};

/// Wires the configured loader, embedder and vector store around `llm`.
pub fn build_assistant(config: &AppConfig, llm: Arc<dyn LlmService>) -> Result<Assistant> {
    let embedding = embedding::from_config(&config.config.embedding)?;
    let store = vector_store::from_config(&config.config, embedding.model())?;
    let index = IndexService::new(embedding, store)
        .with_batch_size(config.config.embedding.batch_size);

    Ok(Assistant::new(
        Arc::new(FsDocumentLoader::new()),
        Arc::new(index),
        llm,
        config.assistant_settings(),
    ))
}
