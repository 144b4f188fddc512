use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Embedding, SourceType};

/// One page (PDF) or one file (Markdown) of raw text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
    pub source_type: SourceType,
    /// 1-based page number, PDFs only.
    pub page: Option<usize>,
    pub title: Option<String>,
}

impl DocumentMetadata {
    pub fn new(source: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            source: source.into(),
            source_type,
            page: None,
            title: None,
        }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub chunk_index: usize,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    pub fn new(document_id: Uuid, content: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            content: content.into(),
            chunk_index,
            metadata: ChunkMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: Option<usize>,
    pub title: Option<String>,
    /// Byte offset of the chunk inside its document's content.
    pub start_offset: usize,
}

impl ChunkMetadata {
    pub fn from_document(metadata: &DocumentMetadata, start_offset: usize) -> Self {
        Self {
            source: metadata.source.clone(),
            page: metadata.page,
            title: metadata.title.clone(),
            start_offset,
        }
    }

    /// Short label used when quoting the chunk in a prompt.
    pub fn citation(&self) -> String {
        match self.page {
            Some(page) => format!("{}, page {}", self.source, page),
            None => self.source.clone(),
        }
    }
}

/// A chunk with its vector, as persisted in a vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Insertion order within the index; breaks score ties.
    pub ordinal: u64,
    pub chunk: DocumentChunk,
    pub embedding: Embedding,
}

impl EmbeddingRecord {
    pub fn id(&self) -> Uuid {
        self.chunk.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: DocumentChunk,
    pub score: f32,
    pub ordinal: u64,
    #[serde(skip)]
    pub embedding: Option<Embedding>,
}

impl SearchResult {
    /// Orders by score descending, then by insertion order.
    pub fn rank_cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(self.ordinal.cmp(&other.ordinal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: f32, ordinal: u64) -> SearchResult {
        SearchResult {
            chunk: DocumentChunk::new(Uuid::new_v4(), "text", 0),
            score,
            ordinal,
            embedding: None,
        }
    }

    #[test]
    fn test_rank_cmp_orders_by_score_then_ordinal() {
        let mut results = vec![result(0.5, 3), result(0.9, 7), result(0.5, 1)];
        results.sort_by(SearchResult::rank_cmp);

        let order: Vec<u64> = results.iter().map(|r| r.ordinal).collect();
        assert_eq!(order, vec![7, 1, 3]);
    }

    #[test]
    fn test_citation_includes_page() {
        let doc = DocumentMetadata::new("handbook.pdf", SourceType::Pdf).with_page(2);
        let meta = ChunkMetadata::from_document(&doc, 0);
        assert_eq!(meta.citation(), "handbook.pdf, page 2");

        let md = DocumentMetadata::new("wiki/home.md", SourceType::Markdown);
        assert_eq!(ChunkMetadata::from_document(&md, 10).citation(), "wiki/home.md");
    }
}
