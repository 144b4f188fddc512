use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, CountPointsBuilder, CreateCollectionBuilder,
    DeleteCollectionBuilder, Distance, PointId, PointStruct, SearchPointsBuilder,
    UpdateCollectionBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{
    ports::{VectorIndex, VectorIndexStore},
    ChunkMetadata, DocumentChunk, DomainError, Embedding, EmbeddingRecord, SearchResult,
};

const UPSERT_BATCH: usize = 256;

const META_MODEL: &str = "embedding_model";
const META_DIMENSION: &str = "dimension";
const META_COMPLETE: &str = "complete";

/// Each index is a Qdrant collection named after the database name. Point ids
/// are the record ordinals.
///
/// Collection metadata records the embedding model and dimension. `complete`
/// is flipped to true only after every point is written, so an interrupted
/// build is refused on load.
pub struct QdrantVectorStore {
    client: Arc<Qdrant>,
    dimension: usize,
    embedding_model: String,
}

impl QdrantVectorStore {
    pub fn new(
        url: &str,
        dimension: usize,
        embedding_model: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| DomainError::upstream(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            dimension,
            embedding_model: embedding_model.into(),
        })
    }

    fn manifest(&self, complete: bool) -> HashMap<String, serde_json::Value> {
        HashMap::from([
            (META_MODEL.to_string(), serde_json::json!(self.embedding_model)),
            (META_DIMENSION.to_string(), serde_json::json!(self.dimension)),
            (META_COMPLETE.to_string(), serde_json::json!(complete)),
        ])
    }

    async fn metadata(&self, collection: &str) -> Result<HashMap<String, Value>, DomainError> {
        let response = self
            .client
            .collection_info(collection)
            .await
            .map_err(|e| DomainError::index(format!("{collection}: {e}")))?;

        Ok(response
            .result
            .and_then(|info| info.config)
            .map(|config| config.metadata)
            .unwrap_or_default())
    }

    async fn count(&self, collection: &str) -> Result<usize, DomainError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(|e| DomainError::index(format!("{collection}: {e}")))?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    fn payload(chunk: &DocumentChunk) -> Result<Payload, DomainError> {
        serde_json::json!({
            "chunk_id": chunk.id.to_string(),
            "document_id": chunk.document_id.to_string(),
            "content": chunk.content,
            "chunk_index": chunk.chunk_index,
            "source": chunk.metadata.source,
            "page": chunk.metadata.page,
            "title": chunk.metadata.title,
            "start_offset": chunk.metadata.start_offset,
        })
        .try_into()
        .map_err(|_| DomainError::internal("Failed to create payload"))
    }
}

#[async_trait]
impl VectorIndexStore for QdrantVectorStore {
    async fn exists(&self, db_name: &str) -> Result<bool, DomainError> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| DomainError::upstream(e.to_string()))?;

        Ok(collections.collections.iter().any(|c| c.name == db_name))
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn build(
        &self,
        db_name: &str,
        records: Vec<EmbeddingRecord>,
    ) -> Result<Arc<dyn VectorIndex>, DomainError> {
        if self.exists(db_name).await? {
            self.client
                .delete_collection(DeleteCollectionBuilder::new(db_name))
                .await
                .map_err(|e| DomainError::upstream(e.to_string()))?;
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(db_name)
                    .vectors_config(VectorParamsBuilder::new(
                        self.dimension as u64,
                        Distance::Cosine,
                    ))
                    .metadata(self.manifest(false)),
            )
            .await
            .map_err(|e| DomainError::upstream(e.to_string()))?;

        for batch in records.chunks(UPSERT_BATCH) {
            let points = batch
                .iter()
                .map(|record| {
                    Ok(PointStruct::new(
                        record.ordinal,
                        record.embedding.as_slice().to_vec(),
                        Self::payload(&record.chunk)?,
                    ))
                })
                .collect::<Result<Vec<_>, DomainError>>()?;

            self.client
                .upsert_points(UpsertPointsBuilder::new(db_name, points).wait(true))
                .await
                .map_err(|e| DomainError::upstream(e.to_string()))?;
        }

        self.client
            .update_collection(UpdateCollectionBuilder::new(db_name).metadata(self.manifest(true)))
            .await
            .map_err(|e| DomainError::upstream(e.to_string()))?;

        info!(db_name, records = records.len(), "collection populated");
        Ok(Arc::new(QdrantIndex {
            client: self.client.clone(),
            name: db_name.to_string(),
            len: records.len(),
        }))
    }

    async fn load(&self, db_name: &str) -> Result<Arc<dyn VectorIndex>, DomainError> {
        if !self.exists(db_name).await? {
            return Err(DomainError::index(format!(
                "collection '{db_name}' does not exist"
            )));
        }

        let metadata = self.metadata(db_name).await?;
        check_manifest(db_name, &metadata, &self.embedding_model, self.dimension)?;

        let len = self.count(db_name).await?;
        Ok(Arc::new(QdrantIndex {
            client: self.client.clone(),
            name: db_name.to_string(),
            len,
        }))
    }
}

/// Rejects collections that were left half-built or were embedded with a
/// different model or dimension.
fn check_manifest(
    db_name: &str,
    metadata: &HashMap<String, Value>,
    embedding_model: &str,
    dimension: usize,
) -> Result<(), DomainError> {
    if metadata.get(META_COMPLETE).and_then(Value::as_bool) != Some(true) {
        return Err(DomainError::index(format!(
            "collection '{db_name}' was not completely built"
        )));
    }

    let model = metadata.get(META_MODEL).and_then(Value::as_str);
    if model.map(String::as_str) != Some(embedding_model) {
        return Err(DomainError::index(format!(
            "{db_name}: built with embedding model '{}', configured model is '{embedding_model}'",
            model.map(String::as_str).unwrap_or("unknown")
        )));
    }

    let built = metadata.get(META_DIMENSION).and_then(Value::as_integer);
    if built != Some(dimension as i64) {
        return Err(DomainError::index(format!(
            "{db_name}: built with dimension {}, configured dimension is {dimension}",
            built.map(|d| d.to_string()).unwrap_or_else(|| "unknown".to_string())
        )));
    }

    Ok(())
}

pub struct QdrantIndex {
    client: Arc<Qdrant>,
    name: String,
    len: usize,
}

fn point_ordinal(id: Option<PointId>) -> Option<u64> {
    match id?.point_id_options? {
        PointIdOptions::Num(n) => Some(n),
        PointIdOptions::Uuid(_) => None,
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.len
    }

    async fn search(
        &self,
        query: &Embedding,
        limit: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.name, query.as_slice().to_vec(), limit as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| DomainError::upstream(e.to_string()))?;

        let mut search_results: Vec<SearchResult> = results
            .result
            .into_iter()
            .filter_map(|point| {
                let ordinal = point_ordinal(point.id)?;
                let payload = point.payload;

                let id: Uuid = payload.get("chunk_id")?.as_str()?.parse().ok()?;
                let document_id: Uuid = payload.get("document_id")?.as_str()?.parse().ok()?;
                let content = payload.get("content")?.as_str()?.to_string();
                let chunk_index = payload.get("chunk_index")?.as_integer()? as usize;

                let metadata = ChunkMetadata {
                    source: payload
                        .get("source")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                        .unwrap_or_default(),
                    page: payload
                        .get("page")
                        .and_then(|v| v.as_integer())
                        .map(|p| p as usize),
                    title: payload
                        .get("title")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    start_offset: payload
                        .get("start_offset")
                        .and_then(|v| v.as_integer())
                        .unwrap_or(0) as usize,
                };

                Some(SearchResult {
                    chunk: DocumentChunk {
                        id,
                        document_id,
                        content,
                        chunk_index,
                        metadata,
                    },
                    score: point.score,
                    ordinal,
                    embedding: None,
                })
            })
            .collect();

        search_results.sort_by(SearchResult::rank_cmp);
        Ok(search_results)
    }
}
