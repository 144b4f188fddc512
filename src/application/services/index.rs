use std::sync::Arc;
use tracing::{info, instrument};

use crate::application::services::{Retriever, RetrieverConfig};
use crate::domain::{
    ports::{EmbeddingService, VectorIndex, VectorIndexStore},
    DocumentChunk, DomainError, EmbeddingRecord,
};

const DEFAULT_BATCH_SIZE: usize = 64;

/// Embeds chunks into named vector indexes and opens them for retrieval.
pub struct IndexService {
    embedding: Arc<dyn EmbeddingService>,
    store: Arc<dyn VectorIndexStore>,
    batch_size: usize,
}

impl IndexService {
    pub fn new(embedding: Arc<dyn EmbeddingService>, store: Arc<dyn VectorIndexStore>) -> Self {
        Self {
            embedding,
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn embedding(&self) -> &Arc<dyn EmbeddingService> {
        &self.embedding
    }

    pub async fn exists(&self, db_name: &str) -> Result<bool, DomainError> {
        self.store.exists(db_name).await
    }

    /// Embeds every chunk and persists the index, replacing any previous one.
    /// Ordinals follow chunk order, so identical input yields an identical index.
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn build(
        &self,
        chunks: &[DocumentChunk],
        db_name: &str,
    ) -> Result<Arc<dyn VectorIndex>, DomainError> {
        let batches = chunks.len().div_ceil(self.batch_size);
        let mut records = Vec::with_capacity(chunks.len());

        for (i, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
            let embeddings = self.embedding.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(DomainError::upstream(format!(
                    "embedding service returned {} vectors for {} texts",
                    embeddings.len(),
                    batch.len()
                )));
            }

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                records.push(EmbeddingRecord {
                    ordinal: records.len() as u64,
                    chunk: chunk.clone(),
                    embedding,
                });
            }
            info!(batch = i + 1, batches, "embedded batch");
        }

        let index = self.store.build(db_name, records).await?;
        info!(db_name, chunks = index.len(), model = self.embedding.model(), "index built");
        Ok(index)
    }

    #[instrument(skip(self))]
    pub async fn load(&self, db_name: &str) -> Result<Arc<dyn VectorIndex>, DomainError> {
        self.store.load(db_name).await
    }

    pub fn retriever(&self, index: Arc<dyn VectorIndex>, config: RetrieverConfig) -> Retriever {
        Retriever::new(self.embedding.clone(), index, config)
    }
}
