//! LLM provider factory.

use std::sync::Arc;
use std::time::Duration;

use insight_core::{AppError, AppResult, LlmSettings};

use crate::client::LlmClient;
use crate::providers::OllamaClient;

/// Create the configured LLM client.
///
/// # Errors
/// `AppError::Config` for an unknown provider.
pub fn create_client(settings: &LlmSettings) -> AppResult<Arc<dyn LlmClient>> {
    match settings.provider.to_lowercase().as_str() {
        "ollama" => {
            let client = OllamaClient::with_base_url(&settings.endpoint)
                .with_timeout(Duration::from_secs(settings.timeout_secs));
            Ok(Arc::new(client))
        }
        other => Err(AppError::Config(format!("Unknown LLM provider: {}", other))),
    }
}
