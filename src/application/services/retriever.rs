use std::sync::Arc;
use tracing::{debug, instrument};

use crate::domain::{
    ports::{EmbeddingService, VectorIndex},
    DomainError, SearchResult,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchStrategy {
    /// Highest cosine similarity first.
    Similarity,
    /// Maximal marginal relevance. `lambda` weighs relevance against novelty.
    Mmr { lambda: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrieverConfig {
    pub top_k: usize,
    pub fetch_k: usize,
    pub min_score: f32,
    pub strategy: SearchStrategy,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 20,
            fetch_k: 40,
            min_score: 0.2,
            strategy: SearchStrategy::Similarity,
        }
    }
}

/// Embeds a query and returns the most relevant chunks of one index.
pub struct Retriever {
    embedding: Arc<dyn EmbeddingService>,
    index: Arc<dyn VectorIndex>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        embedding: Arc<dyn EmbeddingService>,
        index: Arc<dyn VectorIndex>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            embedding,
            index,
            config,
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// At most `top_k` results scoring at least `min_score`, highest score
    /// first with ties broken by insertion order.
    #[instrument(skip(self), fields(index = %self.index.name()))]
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, DomainError> {
        let config = &self.config;
        if config.top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedding.embed(query).await?;
        let pool = config.fetch_k.max(config.top_k);

        let mut candidates: Vec<SearchResult> = self
            .index
            .search(&embedding, pool)
            .await?
            .into_iter()
            .filter(|r| r.score >= config.min_score)
            .collect();
        candidates.sort_by(SearchResult::rank_cmp);

        let mut selected = match config.strategy {
            SearchStrategy::Similarity => {
                candidates.truncate(config.top_k);
                candidates
            }
            SearchStrategy::Mmr { lambda } => mmr_select(candidates, config.top_k, lambda),
        };
        selected.sort_by(SearchResult::rank_cmp);

        debug!(results = selected.len(), "retrieved chunks");
        Ok(selected)
    }
}

/// Greedy MMR over `candidates`, which must already be in rank order.
fn mmr_select(mut candidates: Vec<SearchResult>, k: usize, lambda: f32) -> Vec<SearchResult> {
    let mut selected: Vec<SearchResult> = Vec::with_capacity(k.min(candidates.len()));

    while selected.len() < k && !candidates.is_empty() {
        let mut best = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (i, candidate) in candidates.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|s| similarity(candidate, s))
                .fold(0.0f32, f32::max);
            let score = lambda * candidate.score - (1.0 - lambda) * redundancy;
            if score > best_score {
                best = i;
                best_score = score;
            }
        }

        selected.push(candidates.remove(best));
    }

    selected
}

// Results without vectors (remote backends) count as unrelated.
fn similarity(a: &SearchResult, b: &SearchResult) -> f32 {
    match (&a.embedding, &b.embedding) {
        (Some(x), Some(y)) => x.cosine_similarity(y),
        _ => 0.0,
    }
}
