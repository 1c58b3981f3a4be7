//! Ingest command handler.

use clap::Args;
use insight_core::{AppConfig, AppResult};
use insight_knowledge::{open_pipeline, IngestReport, OpenOutcome};
use std::path::PathBuf;

/// Build the index from documents and persist it
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest (PDF, text, Markdown, HTML)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Reuse the persisted index when the documents have not changed
    #[arg(long)]
    pub if_changed: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for base '{}'", config.base);
        tracing::debug!("Ingest options: {:?}", self);

        config.ensure_insight_dir()?;
        let pipeline = open_pipeline(config)?;

        if self.if_changed {
            match pipeline.open_or_ingest(self.paths.as_slice()).await? {
                OpenOutcome::Loaded(manifest) => {
                    if self.json {
                        let output = serde_json::json!({
                            "base": config.base,
                            "rebuilt": false,
                            "indexPath": pipeline.index_path(),
                            "manifest": manifest,
                        });
                        println!("{}", serde_json::to_string_pretty(&output)?);
                    } else {
                        println!(
                            "Index is up to date ({} documents, {} chunks) at {}",
                            manifest.document_count,
                            manifest.chunk_count,
                            pipeline.index_path().display()
                        );
                    }
                }
                OpenOutcome::Built(report) => self.print_report(&config.base, &report)?,
            }
        } else {
            let report = pipeline.ingest_paths(self.paths.as_slice()).await?;
            self.print_report(&config.base, &report)?;
        }

        Ok(())
    }

    fn print_report(&self, base: &str, report: &IngestReport) -> AppResult<()> {
        if self.json {
            let output = serde_json::json!({
                "base": base,
                "rebuilt": true,
                "documents": report.documents,
                "chunks": report.chunks,
                "dimension": report.dimension,
                "indexPath": report.index_path,
                "corpusHash": report.corpus_hash,
                "durationMs": report.duration_ms,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Ingested {} documents ({} chunks, {}-dim) in {:.2}s",
                report.documents,
                report.chunks,
                report.dimension,
                report.duration_ms as f64 / 1000.0
            );
            println!("Index: {}", report.index_path.display());
        }
        Ok(())
    }
}
