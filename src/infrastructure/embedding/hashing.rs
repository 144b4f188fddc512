use async_trait::async_trait;
use rustc_hash::FxHasher;
use std::hash::Hasher;

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};

/// Offline feature-hashing embedder.
///
/// Each lowercase alphanumeric token is hashed into one of `dimension`
/// buckets with a hash-derived sign, and the vector is L2-normalised. Texts
/// sharing words score high under cosine similarity. Output is stable across
/// runs and platforms.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimension: usize,
    model: String,
}

impl HashingEmbedding {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model: format!("hashing-{dimension}"),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = FxHasher::default();
            hasher.write(token.to_lowercase().as_bytes());
            let hash = hasher.finish();

            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Embedding::new(vector)
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingService for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}
