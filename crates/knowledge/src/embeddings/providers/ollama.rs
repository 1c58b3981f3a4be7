//! Ollama embedding provider.
//!
//! Uses the batch endpoint `POST /api/embed` with models such as
//! `mxbai-embed-large`. Requests are not retried here; callers decide.

use std::time::Duration;

use async_trait::async_trait;
use insight_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::embeddings::EmbeddingProvider;

const EMBED_ENDPOINT: &str = "/api/embed";

/// Ollama embedding provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Build a provider; no request is made until the first embedding.
    pub fn new(
        base_url: &str,
        model: &str,
        dimensions: usize,
        batch_size: usize,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AppError::Config(format!("Failed to create HTTP client for Ollama: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimensions,
            batch_size: batch_size.max(1),
        })
    }

    #[instrument(skip(self, texts), fields(batch = texts.len(), model = %self.model))]
    async fn embed_request(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}{}", self.base_url, EMBED_ENDPOINT);

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| {
                AppError::Embedding(format!("Failed to reach Ollama at {}: {}", self.base_url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let detail = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);
            return Err(AppError::Embedding(format!(
                "Ollama API error ({}): {}. Is the model pulled? Run: ollama pull {}",
                status, detail, self.model
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to parse Ollama response: {}", e)))?;

        if body.embeddings.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "Ollama returned {} embeddings for {} inputs",
                body.embeddings.len(),
                texts.len()
            )));
        }

        if let Some(bad) = body.embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(AppError::Embedding(format!(
                "Model '{}' returned {} dimensions, expected {}",
                self.model,
                bad.len(),
                self.dimensions
            )));
        }

        debug!("Received {} embeddings", body.embeddings.len());
        Ok(body.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_request(batch).await?);
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer every connection with the same canned response.
    async fn serve(status_line: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let body = body.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    loop {
                        let n = socket.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                        let text = String::from_utf8_lossy(&buf).to_string();
                        if let Some(end) = text.find("\r\n\r\n") {
                            let len = text[..end]
                                .lines()
                                .find_map(|l| {
                                    l.to_ascii_lowercase()
                                        .strip_prefix("content-length:")
                                        .and_then(|v| v.trim().parse::<usize>().ok())
                                })
                                .unwrap_or(0);
                            if buf.len() >= end + 4 + len {
                                break;
                            }
                        }
                    }
                    let reply = format!(
                        "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status_line,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(reply.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{}", addr)
    }

    fn provider(url: &str, dimensions: usize, batch_size: usize) -> OllamaProvider {
        OllamaProvider::new(url, "mxbai-embed-large", dimensions, batch_size, Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_embed_batch_success() {
        let url = serve(
            "HTTP/1.1 200 OK",
            r#"{"model":"mxbai-embed-large","embeddings":[[0.1,0.2,0.3],[0.4,0.5,0.6]]}"#.to_string(),
        )
        .await;

        let texts = vec!["a".to_string(), "b".to_string()];
        let embeddings = provider(&url, 3, 32).embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);
    }

    #[tokio::test]
    async fn test_count_mismatch_is_error() {
        let url = serve(
            "HTTP/1.1 200 OK",
            r#"{"embeddings":[[0.1,0.2,0.3]]}"#.to_string(),
        )
        .await;

        let texts = vec!["a".to_string(), "b".to_string()];
        let err = provider(&url, 3, 32).embed_batch(&texts).await.unwrap_err();
        assert!(matches!(err, AppError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_error() {
        let url = serve("HTTP/1.1 200 OK", r#"{"embeddings":[[0.1,0.2]]}"#.to_string()).await;

        let err = provider(&url, 3, 32)
            .embed_batch(&["a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_api_error_is_embedding_error() {
        let url = serve(
            "HTTP/1.1 404 Not Found",
            r#"{"error":"model \"mxbai-embed-large\" not found"}"#.to_string(),
        )
        .await;

        let err = provider(&url, 3, 32).embed("a").await.unwrap_err();
        match err {
            AppError::Embedding(msg) => assert!(msg.contains("not found")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_batches_are_concatenated_in_order() {
        // Every request gets one vector back, so a batch size of 1 yields one per text.
        let url = serve("HTTP/1.1 200 OK", r#"{"embeddings":[[1.0,0.0]]}"#.to_string()).await;

        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let embeddings = provider(&url, 2, 1).embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = provider(&format!("http://{}", addr), 3, 32)
            .embed("a")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Embedding(_)));
    }
}
