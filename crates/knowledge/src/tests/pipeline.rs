//! End-to-end pipeline scenarios with offline embeddings and a stub model.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use insight_core::AppError;
use tempfile::TempDir;

use super::{DownProvider, GatedProvider, StubLlm};
use crate::chunker::ChunkingParams;
use crate::config::{get_index_path, KnowledgeSettings};
use crate::embeddings::providers::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::index::Metric;
use crate::pipeline::{OpenOutcome, PipelinePhase, RagPipeline};
use crate::rag::{Answerer, QueryRequest};
use crate::types::Document;

const DIMENSIONS: usize = 384;

fn settings(workspace: &Path) -> KnowledgeSettings {
    KnowledgeSettings::new(
        ChunkingParams::new(500, 100).unwrap(),
        10,
        Metric::Cosine,
        get_index_path(workspace, "default"),
    )
    .unwrap()
}

fn pipeline_with(
    workspace: &Path,
    provider: Arc<dyn EmbeddingProvider>,
    llm: Arc<StubLlm>,
) -> RagPipeline {
    RagPipeline::builder()
        .settings(settings(workspace))
        .embedding_provider(provider)
        .answerer(Answerer::new(llm, "llama3"))
        .build()
        .unwrap()
}

fn pipeline(workspace: &Path) -> RagPipeline {
    pipeline_with(
        workspace,
        Arc::new(TrigramProvider::new(DIMENSIONS)),
        Arc::new(StubLlm::replying("About 30cm.")),
    )
}

fn report_documents() -> Vec<Document> {
    vec![
        Document::new("rain", "rain.txt", "Rainfall increases 10%"),
        Document::new("sea", "sea.txt", "Sea level rises 30cm"),
        Document::new("temp", "temp.txt", "Temperature rises 2C"),
    ]
}

fn write_corpus(workspace: &Path) -> PathBuf {
    let corpus = workspace.join("corpus");
    fs::create_dir_all(&corpus).unwrap();
    fs::write(corpus.join("rain.txt"), "Rainfall increases 10%").unwrap();
    fs::write(corpus.join("sea.md"), "# Sea\n\nSea level rises 30cm").unwrap();
    fs::write(corpus.join("temp.txt"), "Temperature rises 2C").unwrap();
    corpus
}

#[tokio::test]
async fn test_sea_level_question_retrieves_sea_chunk_only() {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(StubLlm::replying("About 30cm."));
    let pipeline = pipeline_with(dir.path(), Arc::new(TrigramProvider::new(DIMENSIONS)), llm.clone());

    let report = pipeline.ingest(&report_documents()).await.unwrap();
    assert_eq!(report.documents, 3);
    assert_eq!(report.chunks, 3);
    assert_eq!(report.dimension, DIMENSIONS);
    assert!(report.index_path.exists());
    assert_eq!(pipeline.phase(), PipelinePhase::Ingested);

    let answer = pipeline
        .answer_with_k("How much will the sea rise?", Some(1))
        .await
        .unwrap();

    assert_eq!(answer.text, "About 30cm.");
    assert_eq!(answer.retrieval.texts(), vec!["Sea level rises 30cm"]);

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].prompt.contains("Sea level rises 30cm"));
    assert!(!requests[0].prompt.contains("Rainfall increases 10%"));
    assert!(requests[0].prompt.contains("How much will the sea rise?"));
}

#[tokio::test]
async fn test_answer_before_ingest_is_index_not_found() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(dir.path());

    assert_eq!(pipeline.phase(), PipelinePhase::NotIngested);
    let err = pipeline.answer("How much will the sea rise?").await.unwrap_err();
    assert!(matches!(err, AppError::IndexNotFound(_)));
}

#[tokio::test]
async fn test_queries_during_ingest_are_not_ready() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(GatedProvider::new(DIMENSIONS));
    let pipeline = Arc::new(pipeline_with(
        dir.path(),
        provider.clone(),
        Arc::new(StubLlm::replying("About 30cm.")),
    ));

    let ingest = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            let documents = report_documents();
            pipeline.ingest(&documents).await
        })
    };

    provider.entered.notified().await;
    assert_eq!(pipeline.phase(), PipelinePhase::Ingesting);

    let err = pipeline.answer("How much will the sea rise?").await.unwrap_err();
    assert!(matches!(err, AppError::NotReady(_)));

    let err = pipeline.ingest(&report_documents()).await.unwrap_err();
    assert!(matches!(err, AppError::NotReady(_)));

    let err = pipeline.load().await.unwrap_err();
    assert!(matches!(err, AppError::NotReady(_)));

    provider.release.notify_one();
    ingest.await.unwrap().unwrap();

    assert_eq!(pipeline.phase(), PipelinePhase::Ingested);
    let answer = pipeline.answer("How much will the sea rise?").await.unwrap();
    assert_eq!(answer.retrieval.len(), 3);
}

#[tokio::test]
async fn test_failed_ingest_keeps_previous_phase() {
    let dir = TempDir::new().unwrap();

    let down = pipeline_with(
        dir.path(),
        Arc::new(DownProvider),
        Arc::new(StubLlm::replying("unused")),
    );
    let err = down.ingest(&report_documents()).await.unwrap_err();
    assert!(matches!(err, AppError::Embedding(_)));
    assert_eq!(down.phase(), PipelinePhase::NotIngested);
    assert!(!down.index_path().exists());

    let pipeline = pipeline(dir.path());
    pipeline.ingest(&report_documents()).await.unwrap();

    let err = pipeline.ingest(&[]).await.unwrap_err();
    assert!(matches!(err, AppError::Document(_)));
    assert_eq!(pipeline.phase(), PipelinePhase::Ingested);
    assert!(pipeline.answer("Will it rain more?").await.is_ok());
}

#[tokio::test]
async fn test_cancelled_ingest_restores_phase() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(GatedProvider::new(DIMENSIONS));
    let pipeline = pipeline_with(
        dir.path(),
        provider.clone(),
        Arc::new(StubLlm::replying("unused")),
    );

    let documents = report_documents();
    tokio::select! {
        _ = pipeline.ingest(&documents) => panic!("ingest should still be waiting"),
        _ = provider.entered.notified() => {}
    }

    assert_eq!(pipeline.phase(), PipelinePhase::NotIngested);
}

#[tokio::test]
async fn test_generation_error_surfaces() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_with(
        dir.path(),
        Arc::new(TrigramProvider::new(DIMENSIONS)),
        Arc::new(StubLlm::failing(|| {
            AppError::Generation("model 'llama3' not found".to_string())
        })),
    );
    pipeline.ingest(&report_documents()).await.unwrap();

    let err = pipeline.answer("How much will the sea rise?").await.unwrap_err();
    assert!(matches!(err, AppError::Generation(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_load_reproduces_retrieval() {
    let dir = TempDir::new().unwrap();
    let first = pipeline(dir.path());
    first.ingest(&report_documents()).await.unwrap();

    let second = pipeline(dir.path());
    let manifest = second.load().await.unwrap();
    assert_eq!(manifest.chunk_count, 3);
    assert_eq!(manifest.signature, second.signature());
    assert_eq!(second.phase(), PipelinePhase::Ingested);

    for question in ["How much will the sea rise?", "rainfall", "temperature"] {
        for k in [1, 2, 3, 10] {
            assert_eq!(
                first.retrieve(question, Some(k)).await.unwrap(),
                second.retrieve(question, Some(k)).await.unwrap()
            );
        }
    }
}

#[tokio::test]
async fn test_load_rejects_corrupt_and_incompatible_index() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(dir.path());
    assert!(pipeline.load().await.unwrap_err().needs_rebuild());

    pipeline.ingest(&report_documents()).await.unwrap();

    let smaller = pipeline_with(
        dir.path(),
        Arc::new(TrigramProvider::new(128)),
        Arc::new(StubLlm::replying("unused")),
    );
    let err = smaller.load().await.unwrap_err();
    assert!(matches!(err, AppError::IndexNotFound(_)));
    assert_eq!(smaller.phase(), PipelinePhase::NotIngested);

    fs::write(pipeline.index_path(), b"garbage, not an index").unwrap();
    let fresh = self::pipeline(dir.path());
    assert!(matches!(fresh.load().await, Err(AppError::IndexNotFound(_))));
}

#[tokio::test]
async fn test_open_or_ingest_reuses_current_index() {
    let dir = TempDir::new().unwrap();
    let corpus = write_corpus(dir.path());

    let first = pipeline(dir.path());
    match first.open_or_ingest(&[&corpus]).await.unwrap() {
        OpenOutcome::Built(report) => assert_eq!(report.documents, 3),
        other => panic!("expected a build, got {other:?}"),
    }

    let second = pipeline(dir.path());
    match second.open_or_ingest(&[&corpus]).await.unwrap() {
        OpenOutcome::Loaded(manifest) => assert_eq!(manifest.document_count, 3),
        other => panic!("expected a load, got {other:?}"),
    }

    fs::write(corpus.join("temp.txt"), "Temperature rises 3C").unwrap();
    let third = pipeline(dir.path());
    assert!(matches!(
        third.open_or_ingest(&[&corpus]).await.unwrap(),
        OpenOutcome::Built(_)
    ));

    let retrieval = third.retrieve("temperature", Some(1)).await.unwrap();
    assert_eq!(retrieval.texts(), vec!["Temperature rises 3C"]);
}

#[tokio::test]
async fn test_open_or_ingest_rebuilds_corrupt_index() {
    let dir = TempDir::new().unwrap();
    let corpus = write_corpus(dir.path());
    let index_path = get_index_path(dir.path(), "default");
    fs::create_dir_all(index_path.parent().unwrap()).unwrap();
    fs::write(&index_path, b"partial write").unwrap();

    let pipeline = pipeline(dir.path());
    assert!(matches!(
        pipeline.open_or_ingest(&[&corpus]).await.unwrap(),
        OpenOutcome::Built(_)
    ));
    assert_eq!(pipeline.phase(), PipelinePhase::Ingested);
}

#[tokio::test]
async fn test_failed_rebuild_of_stale_index_stays_not_ingested() {
    let dir = TempDir::new().unwrap();
    let corpus = write_corpus(dir.path());

    let builder = pipeline_with(
        dir.path(),
        Arc::new(TrigramProvider::new(64)),
        Arc::new(StubLlm::replying("unused")),
    );
    builder.ingest_paths(&[&corpus]).await.unwrap();

    fs::write(corpus.join("temp.txt"), "Temperature rises 3C").unwrap();
    let down = pipeline_with(
        dir.path(),
        Arc::new(DownProvider),
        Arc::new(StubLlm::replying("unused")),
    );
    let err = down.open_or_ingest(&[&corpus]).await.unwrap_err();
    assert!(matches!(err, AppError::Embedding(_)));
    assert_eq!(down.phase(), PipelinePhase::NotIngested);
    assert!(down.manifest().is_none());
    assert!(matches!(
        down.answer("temperature").await,
        Err(AppError::IndexNotFound(_))
    ));
}

#[tokio::test]
async fn test_duplicate_documents_rejected_before_embedding() {
    let dir = TempDir::new().unwrap();
    let down = pipeline_with(
        dir.path(),
        Arc::new(DownProvider),
        Arc::new(StubLlm::replying("unused")),
    );

    let mut documents = report_documents();
    documents.push(Document::new("sea", "sea.txt", "Sea level rises 30cm"));
    let err = down.ingest(&documents).await.unwrap_err();
    assert!(matches!(err, AppError::Document(ref msg) if msg.contains("sea#0")));
    assert_eq!(down.phase(), PipelinePhase::NotIngested);
    assert!(!down.index_path().exists());
}

#[tokio::test]
async fn test_ingest_paths_loads_repeated_paths_once() {
    let dir = TempDir::new().unwrap();
    let corpus = write_corpus(dir.path());
    let sea = corpus.join("sea.md");

    let pipeline = pipeline(dir.path());
    let report = pipeline.ingest_paths(&[&sea, &sea]).await.unwrap();
    assert_eq!(report.documents, 1);

    let report = pipeline.ingest_paths(&[&corpus, &sea]).await.unwrap();
    assert_eq!(report.documents, 3);
}

#[tokio::test]
async fn test_open_or_ingest_propagates_other_errors() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(dir.path());

    let err = pipeline
        .open_or_ingest(&[dir.path().join("missing.txt")])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Document(_)));
}

#[tokio::test]
async fn test_query_endpoint() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(dir.path());
    pipeline.ingest(&report_documents()).await.unwrap();

    let request: QueryRequest =
        serde_json::from_str(r#"{"query": "How much will the sea rise?", "top_k": 1}"#).unwrap();
    let response = pipeline.query(request).await.unwrap();

    assert_eq!(response.result, "About 30cm.");
    assert_eq!(response.sources, vec!["sea#0"]);

    let err = pipeline.query(QueryRequest::new("   ")).await.unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[tokio::test]
async fn test_builder_requires_components() {
    let dir = TempDir::new().unwrap();
    let err = RagPipeline::builder()
        .settings(settings(dir.path()))
        .embedding_provider(Arc::new(TrigramProvider::new(DIMENSIONS)))
        .build()
        .unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}
