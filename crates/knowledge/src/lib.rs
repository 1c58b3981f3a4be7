//! Knowledge base management and retrieval-augmented answering.
//!
//! Documents are split into overlapping chunks, embedded, and kept in an
//! in-memory vector index persisted to SQLite. Questions are answered by
//! retrieving the closest chunks and handing them to a language model
//! through a validated prompt template.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod loader;
pub mod pipeline;
pub mod rag;
pub mod retriever;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunker::ChunkingParams;
pub use config::KnowledgeSettings;
pub use embeddings::{create_provider, Embedder, EmbeddingProvider};
pub use index::{Metric, VectorIndex};
pub use pipeline::{OpenOutcome, PipelinePhase, RagPipeline, RagPipelineBuilder};
pub use rag::{Answer, Answerer, QueryRequest, QueryResponse, SourceRef};
pub use retriever::Retriever;
pub use store::{IndexManifest, IndexSignature};
pub use types::{Chunk, Document, IndexStats, IngestReport, PageSpan, RetrievalResult, ScoredChunk};

use insight_core::{AppConfig, AppResult};
use insight_llm::create_client;
use insight_prompt::resolve_template;

/// Build a pipeline from application configuration.
///
/// The pipeline starts in `NotIngested`; call `load`, `ingest` or
/// `open_or_ingest` before asking questions.
pub fn open_pipeline(config: &AppConfig) -> AppResult<RagPipeline> {
    let settings = KnowledgeSettings::from_app(config)?;
    let provider = create_provider(&config.embedding, config.embedding_endpoint())?;
    let client = create_client(&config.llm)?;
    let template = resolve_template(&config.workspace, config.prompt_id.as_deref())?;

    tracing::debug!(
        "Opening pipeline for base '{}' (embeddings: {}/{}, model: {}, prompt: {})",
        config.base,
        provider.provider_name(),
        provider.model_name(),
        config.llm.model,
        template.id()
    );

    RagPipeline::builder()
        .settings(settings)
        .embedding_provider(provider)
        .answerer(Answerer::from_settings(client, &config.llm))
        .template(template)
        .build()
}

/// Statistics for the configured knowledge base's persisted index.
pub fn stats(config: &AppConfig) -> AppResult<IndexStats> {
    store::stats(&config::get_index_path(&config.workspace, &config.base))
}

/// Delete the configured knowledge base's persisted index.
pub fn clean(config: &AppConfig) -> AppResult<()> {
    store::remove(&config::get_index_path(&config.workspace, &config.base))
}
