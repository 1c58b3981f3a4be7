//! Shared test doubles and crate-level scenarios.

mod pipeline;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use insight_core::{AppError, AppResult};
use insight_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use tokio::sync::Notify;

use crate::embeddings::providers::TrigramProvider;
use crate::embeddings::EmbeddingProvider;

/// Records requests and replies with fixed text or a fresh error.
pub(crate) struct StubLlm {
    reply: Result<String, fn() -> AppError>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl StubLlm {
    pub(crate) fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(make_error: fn() -> AppError) -> Self {
        Self {
            reply: Err(make_error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for StubLlm {
    fn provider_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());

        match &self.reply {
            Ok(text) => Ok(LlmResponse {
                content: text.clone(),
                model: request.model.clone(),
                usage: LlmUsage::new(10, 5),
                done: true,
            }),
            Err(make_error) => Err(make_error()),
        }
    }
}

/// Trigram embeddings whose first batch blocks until released.
#[derive(Debug)]
pub(crate) struct GatedProvider {
    inner: TrigramProvider,
    gated: AtomicBool,
    pub(crate) entered: Notify,
    pub(crate) release: Notify,
}

impl GatedProvider {
    pub(crate) fn new(dimensions: usize) -> Self {
        Self {
            inner: TrigramProvider::new(dimensions),
            gated: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for GatedProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if self.gated.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.embed_batch(texts).await
    }
}

/// Always fails, as an unreachable embedding service would.
#[derive(Debug)]
pub(crate) struct DownProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for DownProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        64
    }

    async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Err(AppError::Embedding("connection refused".to_string()))
    }
}
