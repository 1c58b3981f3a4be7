//! Query-time retrieval: embed the question, search the index.

use std::sync::Arc;

use insight_core::{AppError, AppResult};

use crate::embeddings::Embedder;
use crate::index::VectorIndex;
use crate::types::RetrievalResult;

/// Retrieves the chunks closest to a query. Read-only over a shared index.
#[derive(Debug, Clone)]
pub struct Retriever {
    embedder: Embedder,
    index: Arc<VectorIndex>,
    default_k: usize,
}

impl Retriever {
    pub fn new(embedder: Embedder, index: Arc<VectorIndex>, default_k: usize) -> AppResult<Self> {
        if default_k == 0 {
            return Err(AppError::Config("default_k must be at least 1".to_string()));
        }

        Ok(Self {
            embedder,
            index,
            default_k,
        })
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Top `k` chunks for `query` (or `default_k` when `k` is `None`).
    pub async fn retrieve(&self, query: &str, k: Option<usize>) -> AppResult<RetrievalResult> {
        let k = k.unwrap_or(self.default_k);
        let vector = self.embedder.embed_query(query).await?;
        let result = self.index.search(&vector, k)?;

        tracing::debug!(
            "Retrieved {} of {} chunks (k={}, top score {:?})",
            result.len(),
            self.index.len(),
            k,
            result.top_score()
        );

        Ok(result)
    }
}
