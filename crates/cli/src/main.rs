//! Climate Insight CLI
//!
//! Ingest a climate report into a local vector index and ask questions
//! about it through a local language model.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IndexCommand, IngestCommand};
use insight_core::{logging, AppConfig, AppResult};
use std::path::PathBuf;

/// Climate Insight - question answering over climate reports
#[derive(Parser, Debug)]
#[command(name = "insight")]
#[command(about = "Question answering over climate reports with local RAG", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "INSIGHT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/.insight/config.yaml)
    #[arg(short, long, global = true, env = "INSIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Knowledge base name
    #[arg(short, long, global = true)]
    base: Option<String>,

    /// Generation model identifier
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Log level or filter (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the index from documents and persist it
    Ingest(IngestCommand),

    /// Ask a question about the ingested documents
    Ask(AskCommand),

    /// Inspect or remove the persisted index
    Index(IndexCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(cli.workspace, cli.config)?.with_overrides(
        cli.base,
        cli.model,
        None,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.log_json,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("Climate Insight CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Knowledge base: {}", config.base);
    tracing::debug!("Model: {} via {}", config.llm.model, config.llm.provider);

    config.validate()?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Ask(_) => "ask",
        Commands::Index(_) => "index",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Index(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
