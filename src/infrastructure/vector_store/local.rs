use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::domain::{
    ports::{VectorIndex, VectorIndexStore},
    DomainError, Embedding, EmbeddingRecord, SearchResult,
};

const FORMAT_VERSION: u32 = 1;
const INDEX_FILE: &str = "index.json";

/// Vector indexes persisted as JSON files under `<dir>/<db_name>/`.
pub struct LocalVectorStore {
    dir: PathBuf,
    embedding_model: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    name: String,
    embedding_model: String,
    dimension: usize,
    created_at: DateTime<Utc>,
    records: Vec<EmbeddingRecord>,
}

impl LocalVectorStore {
    /// Indexes are stamped with `embedding_model` and refused on load when
    /// they were built by another model.
    pub fn new(dir: impl Into<PathBuf>, embedding_model: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            embedding_model: embedding_model.into(),
        }
    }

    pub fn index_path(&self, db_name: &str) -> PathBuf {
        self.dir.join(db_name).join(INDEX_FILE)
    }
}

#[async_trait]
impl VectorIndexStore for LocalVectorStore {
    async fn exists(&self, db_name: &str) -> Result<bool, DomainError> {
        Ok(self.index_path(db_name).is_file())
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn build(
        &self,
        db_name: &str,
        records: Vec<EmbeddingRecord>,
    ) -> Result<Arc<dyn VectorIndex>, DomainError> {
        let dimension = records.first().map(|r| r.embedding.dimension()).unwrap_or(0);
        if records.iter().any(|r| r.embedding.dimension() != dimension) {
            return Err(DomainError::validation(
                "all embeddings in an index must share one dimension",
            ));
        }

        let file = IndexFile {
            version: FORMAT_VERSION,
            name: db_name.to_string(),
            embedding_model: self.embedding_model.clone(),
            dimension,
            created_at: Utc::now(),
            records,
        };
        let path = self.index_path(db_name);

        let file = tokio::task::spawn_blocking(move || -> Result<IndexFile, DomainError> {
            write_index(&path, &file)?;
            Ok(file)
        })
        .await
        .map_err(|e| DomainError::internal(format!("index writer failed: {e}")))??;

        info!(db_name, records = file.records.len(), dimension, "index persisted");
        Ok(Arc::new(LocalVectorIndex::new(db_name, file.records)))
    }

    #[instrument(skip(self))]
    async fn load(&self, db_name: &str) -> Result<Arc<dyn VectorIndex>, DomainError> {
        let path = self.index_path(db_name);
        let file = tokio::task::spawn_blocking(move || read_index(&path))
            .await
            .map_err(|e| DomainError::internal(format!("index reader failed: {e}")))??;

        if file.version != FORMAT_VERSION {
            return Err(DomainError::index(format!(
                "{db_name}: unsupported format version {}",
                file.version
            )));
        }
        if file.embedding_model != self.embedding_model {
            return Err(DomainError::index(format!(
                "{db_name}: built with embedding model '{}', configured model is '{}'",
                file.embedding_model, self.embedding_model
            )));
        }
        if file
            .records
            .iter()
            .any(|r| r.embedding.dimension() != file.dimension)
        {
            return Err(DomainError::index(format!(
                "{db_name}: records do not match dimension {}",
                file.dimension
            )));
        }

        info!(db_name, records = file.records.len(), "index loaded");
        Ok(Arc::new(LocalVectorIndex::new(db_name, file.records)))
    }
}

fn write_index(path: &Path, file: &IndexFile) -> Result<(), DomainError> {
    let parent = path
        .parent()
        .ok_or_else(|| DomainError::internal("index path has no parent"))?;
    std::fs::create_dir_all(parent)
        .map_err(|e| DomainError::internal(format!("create {}: {e}", parent.display())))?;

    let json = serde_json::to_vec(file)
        .map_err(|e| DomainError::internal(format!("serialize index: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .map_err(|e| DomainError::internal(format!("write {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| DomainError::internal(format!("rename {}: {e}", tmp.display())))
}

fn read_index(path: &Path) -> Result<IndexFile, DomainError> {
    let bytes = std::fs::read(path)
        .map_err(|e| DomainError::index(format!("{}: {e}", path.display())))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| DomainError::index(format!("{}: {e}", path.display())))
}

/// Brute-force cosine search over records kept in memory.
pub struct LocalVectorIndex {
    name: String,
    records: Vec<EmbeddingRecord>,
}

impl LocalVectorIndex {
    pub fn new(name: impl Into<String>, records: Vec<EmbeddingRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    async fn search(
        &self,
        query: &Embedding,
        limit: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let mut results: Vec<SearchResult> = self
            .records
            .iter()
            .map(|record| SearchResult {
                chunk: record.chunk.clone(),
                score: query.cosine_similarity(&record.embedding),
                ordinal: record.ordinal,
                embedding: Some(record.embedding.clone()),
            })
            .collect();

        results.sort_by(SearchResult::rank_cmp);
        results.truncate(limit);
        Ok(results)
    }
}
