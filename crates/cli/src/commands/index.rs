//! Index maintenance command handler.

use clap::{Args, Subcommand};
use insight_core::{AppConfig, AppResult};

/// Inspect or remove the persisted index
#[derive(Args, Debug)]
pub struct IndexCommand {
    #[command(subcommand)]
    pub action: IndexAction,
}

#[derive(Subcommand, Debug)]
pub enum IndexAction {
    /// Show how the index was built and how large it is
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the persisted index
    Clean,
}

impl IndexCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            IndexAction::Stats { json } => {
                tracing::info!("Reading index stats for base '{}'", config.base);
                let stats = insight_knowledge::stats(config)?;

                if *json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    let manifest = &stats.manifest;
                    println!("Knowledge base: {}", config.base);
                    println!("Index:          {}", stats.path.display());
                    println!("Size:           {} bytes", stats.size_bytes);
                    println!("Documents:      {}", manifest.document_count);
                    println!("Chunks:         {}", manifest.chunk_count);
                    println!(
                        "Embeddings:     {}/{} ({} dimensions, {})",
                        manifest.signature.embedding_provider,
                        manifest.signature.embedding_model,
                        manifest.signature.dimension,
                        manifest.signature.metric
                    );
                    println!(
                        "Chunking:       {} chars, {} overlap",
                        manifest.signature.chunk_size, manifest.signature.chunk_overlap
                    );
                    println!("Built:          {}", manifest.created_at.to_rfc3339());
                }
            }
            IndexAction::Clean => {
                tracing::info!("Cleaning index for base '{}'", config.base);
                insight_knowledge::clean(config)?;
                println!("Removed index for knowledge base '{}'", config.base);
            }
        }

        Ok(())
    }
}
