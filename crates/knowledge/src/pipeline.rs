//! The RAG pipeline: ingest once, then answer questions against the index.
//!
//! A pipeline is in one of three phases. It starts `NotIngested`, moves to
//! `Ingested` after a successful `ingest` or `load`, and is `Ingesting` while
//! either runs. Queries in `NotIngested` fail with `IndexNotFound`; queries
//! (and a second ingest) while `Ingesting` fail with `NotReady`. A failed or
//! cancelled ingest leaves the previous phase in place.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use insight_core::{AppError, AppResult};
use insight_prompt::{default_definition, PromptTemplate};
use serde::Serialize;

use crate::chunker;
use crate::config::KnowledgeSettings;
use crate::embeddings::{Embedder, EmbeddingProvider};
use crate::index::{self, VectorIndex};
use crate::loader;
use crate::rag::{self, Answer, Answerer, QueryRequest, QueryResponse};
use crate::retriever::Retriever;
use crate::store::{self, IndexManifest, IndexSignature};
use crate::types::{Document, IngestReport, RetrievalResult};

/// Observable pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    NotIngested,
    Ingesting,
    Ingested,
}

/// Result of [`RagPipeline::open_or_ingest`].
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    /// A persisted index matched the configuration and corpus.
    Loaded(IndexManifest),
    /// The index was (re)built from the corpus.
    Built(IngestReport),
}

#[derive(Debug, Clone)]
struct ActiveIndex {
    index: Arc<VectorIndex>,
    manifest: IndexManifest,
}

#[derive(Debug)]
enum PipelineState {
    NotIngested,
    /// Holds whatever was active before, restored if the ingest fails.
    Ingesting(Option<ActiveIndex>),
    Ingested(ActiveIndex),
}

/// Puts the pipeline back into its previous phase unless committed.
struct IngestGuard<'a> {
    state: &'a RwLock<PipelineState>,
    committed: bool,
}

impl IngestGuard<'_> {
    fn commit(mut self, active: ActiveIndex) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = PipelineState::Ingested(active);
        self.committed = true;
    }
}

impl Drop for IngestGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let current = std::mem::replace(&mut *state, PipelineState::NotIngested);
        *state = match current {
            PipelineState::Ingesting(Some(previous)) => PipelineState::Ingested(previous),
            PipelineState::Ingesting(None) => PipelineState::NotIngested,
            other => other,
        };
        tracing::warn!("Index update did not complete; previous state restored");
    }
}

/// Retrieval-augmented question answering over a persisted vector index.
#[derive(Debug)]
pub struct RagPipeline {
    settings: KnowledgeSettings,
    embedder: Embedder,
    answerer: Answerer,
    template: PromptTemplate,
    state: RwLock<PipelineState>,
}

impl RagPipeline {
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    pub fn phase(&self) -> PipelinePhase {
        match &*self.read_state() {
            PipelineState::NotIngested => PipelinePhase::NotIngested,
            PipelineState::Ingesting(_) => PipelinePhase::Ingesting,
            PipelineState::Ingested(_) => PipelinePhase::Ingested,
        }
    }

    pub fn settings(&self) -> &KnowledgeSettings {
        &self.settings
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn index_path(&self) -> &Path {
        &self.settings.index_path
    }

    /// Manifest of the active index, if any.
    pub fn manifest(&self) -> Option<IndexManifest> {
        match &*self.read_state() {
            PipelineState::Ingested(active) => Some(active.manifest.clone()),
            _ => None,
        }
    }

    /// What a compatible persisted index must have been built with.
    pub fn signature(&self) -> IndexSignature {
        IndexSignature {
            embedding_provider: self.embedder.provider_name().to_string(),
            embedding_model: self.embedder.model_name().to_string(),
            dimension: self.embedder.dimensions(),
            metric: self.settings.metric,
            chunk_size: self.settings.chunking.chunk_size(),
            chunk_overlap: self.settings.chunking.overlap(),
        }
    }

    /// Chunk, embed, index and persist `documents`, replacing the active index.
    pub async fn ingest(&self, documents: &[Document]) -> AppResult<IngestReport> {
        let guard = self.begin_ingest()?;
        let start = Instant::now();

        if documents.is_empty() {
            return Err(AppError::Document("No documents to ingest".to_string()));
        }

        tracing::info!("Ingesting {} documents", documents.len());

        let chunks = chunker::split_corpus(documents, &self.settings.chunking);
        if chunks.is_empty() {
            return Err(AppError::Document(
                "Documents produced no chunks".to_string(),
            ));
        }
        index::ensure_unique_ids(&chunks)?;
        tracing::info!(
            "Split corpus into {} chunks (size {}, overlap {})",
            chunks.len(),
            self.settings.chunking.chunk_size(),
            self.settings.chunking.overlap()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        let index = Arc::new(VectorIndex::build(chunks, vectors, self.settings.metric)?);

        let manifest = IndexManifest::new(
            self.signature(),
            store::corpus_hash(documents),
            documents.len(),
            index.len(),
        );

        let path = self.settings.index_path.clone();
        {
            let index = Arc::clone(&index);
            let manifest = manifest.clone();
            let path = path.clone();
            tokio::task::spawn_blocking(move || store::persist(&index, &manifest, &path))
                .await
                .map_err(|e| AppError::Storage(format!("Persist task failed: {}", e)))??;
        }

        let report = IngestReport {
            documents: documents.len(),
            chunks: index.len(),
            dimension: manifest.signature.dimension,
            index_path: path,
            corpus_hash: manifest.corpus_hash.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        guard.commit(ActiveIndex { index, manifest });

        tracing::info!(
            "Ingested {} documents into {} chunks in {}ms",
            report.documents,
            report.chunks,
            report.duration_ms
        );
        Ok(report)
    }

    /// Load documents from files and directories, then ingest them.
    pub async fn ingest_paths<P: AsRef<Path>>(&self, paths: &[P]) -> AppResult<IngestReport> {
        let documents = load_documents(paths).await?;
        self.ingest(&documents).await
    }

    /// Activate the persisted index if it matches the current configuration.
    pub async fn load(&self) -> AppResult<IndexManifest> {
        self.load_checked(None).await
    }

    /// Load the persisted index when it is current for `paths`; otherwise rebuild.
    ///
    /// Rebuilds on `IndexNotFound` (missing, unreadable, incompatible or
    /// stale index). Any other error is returned. A stale index is never
    /// activated, so a failed rebuild leaves the previous phase in place.
    pub async fn open_or_ingest<P: AsRef<Path>>(&self, paths: &[P]) -> AppResult<OpenOutcome> {
        let documents = load_documents(paths).await?;
        let hash = store::corpus_hash(&documents);

        match self.load_checked(Some(&hash)).await {
            Ok(manifest) => {
                tracing::info!("Persisted index is current ({} chunks)", manifest.chunk_count);
                return Ok(OpenOutcome::Loaded(manifest));
            }
            Err(e) if e.needs_rebuild() => tracing::info!("Rebuilding index: {}", e),
            Err(e) => return Err(e),
        }

        self.ingest(&documents).await.map(OpenOutcome::Built)
    }

    /// Load and validate the persisted index, committing it only when it
    /// matches the configuration and, if given, the corpus hash.
    async fn load_checked(&self, corpus_hash: Option<&str>) -> AppResult<IndexManifest> {
        let guard = self.begin_ingest()?;

        let path = self.settings.index_path.clone();
        let persisted = tokio::task::spawn_blocking(move || store::load(&path))
            .await
            .map_err(|e| AppError::Storage(format!("Load task failed: {}", e)))??;

        persisted.manifest.check_compatible(&self.signature())?;
        if let Some(hash) = corpus_hash {
            if persisted.manifest.corpus_hash != hash {
                return Err(AppError::IndexNotFound(
                    "Corpus changed since the index was built".to_string(),
                ));
            }
        }

        let manifest = persisted.manifest;
        guard.commit(ActiveIndex {
            index: Arc::new(persisted.index),
            manifest: manifest.clone(),
        });

        Ok(manifest)
    }

    /// Top `k` chunks for `question` (`default_k` when `None`).
    pub async fn retrieve(&self, question: &str, k: Option<usize>) -> AppResult<RetrievalResult> {
        let index = self.active_index()?;
        let question = check_question(question)?;

        Retriever::new(self.embedder.clone(), index, self.settings.default_k)?
            .retrieve(question, k)
            .await
    }

    /// Answer `question` from the `default_k` best chunks.
    pub async fn answer(&self, question: &str) -> AppResult<Answer> {
        self.answer_with_k(question, None).await
    }

    pub async fn answer_with_k(&self, question: &str, k: Option<usize>) -> AppResult<Answer> {
        let retrieval = self.retrieve(question, k).await?;
        let prompt = rag::assemble(question.trim(), &retrieval, &self.template)?;
        self.answerer.answer(&prompt, retrieval).await
    }

    pub async fn query(&self, request: QueryRequest) -> AppResult<QueryResponse> {
        self.answer_with_k(&request.question, request.top_k)
            .await
            .map(Answer::into_response)
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, PipelineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn active_index(&self) -> AppResult<Arc<VectorIndex>> {
        match &*self.read_state() {
            PipelineState::Ingested(active) => Ok(Arc::clone(&active.index)),
            PipelineState::Ingesting(_) => Err(AppError::NotReady(
                "An ingest is in progress; try again when it completes".to_string(),
            )),
            PipelineState::NotIngested => Err(AppError::IndexNotFound(format!(
                "No index loaded; ingest documents or load {:?} first",
                self.settings.index_path
            ))),
        }
    }

    fn begin_ingest(&self) -> AppResult<IngestGuard<'_>> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let previous = match std::mem::replace(&mut *state, PipelineState::NotIngested) {
            PipelineState::Ingesting(previous) => {
                *state = PipelineState::Ingesting(previous);
                return Err(AppError::NotReady(
                    "Another ingest is already in progress".to_string(),
                ));
            }
            PipelineState::Ingested(active) => Some(active),
            PipelineState::NotIngested => None,
        };
        *state = PipelineState::Ingesting(previous);

        Ok(IngestGuard {
            state: &self.state,
            committed: false,
        })
    }
}

fn check_question(question: &str) -> AppResult<&str> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AppError::Config("Question must not be empty".to_string()));
    }
    Ok(question)
}

async fn load_documents<P: AsRef<Path>>(paths: &[P]) -> AppResult<Vec<Document>> {
    let paths: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
    tokio::task::spawn_blocking(move || loader::load_corpus(paths.as_slice()))
        .await
        .map_err(|e| AppError::Document(format!("Document loading task failed: {}", e)))?
}

/// Builder for [`RagPipeline`].
#[derive(Debug, Default)]
pub struct RagPipelineBuilder {
    settings: Option<KnowledgeSettings>,
    embedder: Option<Embedder>,
    answerer: Option<Answerer>,
    template: Option<PromptTemplate>,
}

impl RagPipelineBuilder {
    pub fn settings(mut self, settings: KnowledgeSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn embedder(mut self, embedder: Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn embedding_provider(self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder(Embedder::new(provider))
    }

    pub fn answerer(mut self, answerer: Answerer) -> Self {
        self.answerer = Some(answerer);
        self
    }

    /// Defaults to the built-in climate assistant template.
    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    pub fn build(self) -> AppResult<RagPipeline> {
        let settings = self
            .settings
            .ok_or_else(|| AppError::Config("Pipeline settings are required".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| AppError::Config("An embedding provider is required".to_string()))?;
        let answerer = self
            .answerer
            .ok_or_else(|| AppError::Config("A language model client is required".to_string()))?;
        let template = match self.template {
            Some(template) => template,
            None => PromptTemplate::from_definition(&default_definition())?,
        };

        if embedder.dimensions() == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be at least 1".to_string(),
            ));
        }

        Ok(RagPipeline {
            settings,
            embedder,
            answerer,
            template,
            state: RwLock::new(PipelineState::NotIngested),
        })
    }
}
