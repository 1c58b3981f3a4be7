//! Embedding provider trait and factory.

use std::sync::Arc;
use std::time::Duration;

use insight_core::{AppError, AppResult, EmbeddingSettings};

use super::providers::{OllamaProvider, TrigramProvider};

/// A text embedding backend.
///
/// `embed_batch` returns one vector per input, in input order. Providers do
/// not retry; a failed call is an `AppError::Embedding`.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Provider name (e.g., "ollama", "trigram")
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;

    /// Length of every returned vector
    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create the configured embedding provider.
pub fn create_provider(
    settings: &EmbeddingSettings,
    endpoint: &str,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match settings.provider.as_str() {
        "ollama" => {
            let provider = OllamaProvider::new(
                endpoint,
                &settings.model,
                settings.dimensions,
                settings.batch_size,
                Duration::from_secs(settings.timeout_secs),
            )?;
            Ok(Arc::new(provider))
        }

        "trigram" => Ok(Arc::new(TrigramProvider::new(settings.dimensions))),

        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: ollama, trigram",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_trigram_provider() {
        let settings = EmbeddingSettings {
            provider: "trigram".to_string(),
            dimensions: 384,
            ..EmbeddingSettings::default()
        };

        let provider = create_provider(&settings, "http://localhost:11434").unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_ollama_provider() {
        let provider =
            create_provider(&EmbeddingSettings::default(), "http://localhost:11434").unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "mxbai-embed-large");
        assert_eq!(provider.dimensions(), 1024);
    }

    #[test]
    fn test_create_unknown_provider() {
        let settings = EmbeddingSettings {
            provider: "openai".to_string(),
            ..EmbeddingSettings::default()
        };

        let err = create_provider(&settings, "http://localhost:11434").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let provider = TrigramProvider::new(64);
        let embedding = provider.embed("monsoon variability").await.unwrap();
        assert_eq!(embedding.len(), 64);
    }
}
