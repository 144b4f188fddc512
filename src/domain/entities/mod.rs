mod conversation;
mod document;
mod embedding;
mod source;

pub use conversation::{ConversationMemory, Message, MessageRole, Turn};
pub use document::{
    ChunkMetadata, Document, DocumentChunk, DocumentMetadata, EmbeddingRecord, SearchResult,
};
pub use embedding::Embedding;
pub use source::SourceType;
