//! Ask command handler.
//!
//! Loads the persisted index and answers one question, retrying transient
//! embedding and generation failures when asked to.

use clap::Args;
use insight_core::{AppConfig, AppError, AppResult};
use insight_knowledge::{open_pipeline, Answer, RagPipeline};
use std::time::Duration;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Ask a question about the ingested documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of chunks to retrieve (default: retrieval.topK)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Retry transient failures this many times, with exponential backoff
    #[arg(long, default_value_t = 0)]
    pub retries: u32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command for base '{}'", config.base);
        tracing::debug!("Ask options: {:?}", self);

        let pipeline = open_pipeline(config)?;
        pipeline.load().await.map_err(|e| match e {
            AppError::IndexNotFound(msg) => AppError::IndexNotFound(format!(
                "{}. Run 'insight ingest <paths>' first.",
                msg
            )),
            other => other,
        })?;

        let answer = self.answer_with_retries(&pipeline).await?;

        if self.json {
            let response = answer.into_response();
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            println!("{}", answer.text.trim());
            println!();

            let sources = answer.sources();
            if sources.is_empty() {
                println!("Sources: (none)");
            } else {
                println!("Sources:");
                for source in &sources {
                    match source.page {
                        Some(page) => println!(
                            "- {} (page {}, score {:.3}): {}",
                            source.document, page, source.score, source.snippet
                        ),
                        None => println!(
                            "- {} (score {:.3}): {}",
                            source.document, source.score, source.snippet
                        ),
                    }
                }
            }
        }

        Ok(())
    }

    async fn answer_with_retries(&self, pipeline: &RagPipeline) -> AppResult<Answer> {
        let mut attempt = 0;
        loop {
            match pipeline.answer_with_k(&self.question, self.top_k).await {
                Ok(answer) => return Ok(answer),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    let delay = backoff(attempt);
                    tracing::warn!(
                        "Attempt {} failed ({}); retrying in {}ms",
                        attempt + 1,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Delay before retry number `attempt + 1`.
fn backoff(attempt: u32) -> Duration {
    INITIAL_BACKOFF
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff(0), Duration::from_millis(500));
        assert_eq!(backoff(1), Duration::from_secs(1));
        assert_eq!(backoff(3), Duration::from_secs(4));
        assert_eq!(backoff(10), MAX_BACKOFF);
        assert_eq!(backoff(40), MAX_BACKOFF);
    }
}
