//! Embedding of chunk texts and queries.
//!
//! `Embedder` wraps a provider and checks its output shape, so the index
//! never receives a vector count or length it did not ask for.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

use std::sync::Arc;

use insight_core::{AppError, AppResult};

/// Shape-checked access to an embedding provider. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed texts, one vector per input, in input order.
    pub async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(
            "Embedding {} texts using provider '{}' (model: {})",
            texts.len(),
            self.provider_name(),
            self.model_name()
        );

        let embeddings = self.provider.embed_batch(texts).await?;

        if embeddings.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "Provider '{}' returned {} vectors for {} texts",
                self.provider_name(),
                embeddings.len(),
                texts.len()
            )));
        }

        let expected = self.dimensions();
        if let Some((i, bad)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, e)| e.len() != expected)
        {
            return Err(AppError::Embedding(format!(
                "Provider '{}' returned a {}-dimensional vector at position {}, expected {}",
                self.provider_name(),
                bad.len(),
                i,
                expected
            )));
        }

        tracing::debug!(
            "Generated {} embeddings of dimension {}",
            embeddings.len(),
            expected
        );

        Ok(embeddings)
    }

    /// Embed a single query string.
    pub async fn embed_query(&self, query: &str) -> AppResult<Vec<f32>> {
        self.embed(&[query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned for query".to_string()))
    }
}
