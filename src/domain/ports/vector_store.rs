use crate::domain::{errors::DomainError, Embedding, EmbeddingRecord, SearchResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Persists named vector indexes.
#[async_trait]
pub trait VectorIndexStore: Send + Sync {
    /// Checks for a persisted index without loading it.
    async fn exists(&self, db_name: &str) -> Result<bool, DomainError>;

    /// Persists `records` under `db_name`, replacing any previous index.
    async fn build(
        &self,
        db_name: &str,
        records: Vec<EmbeddingRecord>,
    ) -> Result<Arc<dyn VectorIndex>, DomainError>;

    /// Fails with `IndexCorruptOrMissing` when absent or unreadable.
    async fn load(&self, db_name: &str) -> Result<Arc<dyn VectorIndex>, DomainError>;
}

/// A read-only handle to one index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns at most `limit` results, highest score first, ties by ordinal.
    async fn search(&self, query: &Embedding, limit: usize)
        -> Result<Vec<SearchResult>, DomainError>;
}
