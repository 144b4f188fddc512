mod embedding;
mod llm;
mod loader;
mod vector_store;

pub use embedding::EmbeddingService;
pub use llm::{LlmService, TextStream};
pub use loader::DocumentLoader;
pub use vector_store::{VectorIndex, VectorIndexStore};
