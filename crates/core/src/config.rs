//! Configuration management.
//!
//! Settings are merged in this order, later sources winning:
//! - Built-in defaults
//! - The workspace config file (`.insight/config.yaml`, or `INSIGHT_CONFIG`)
//! - Environment variables
//! - Command-line flags (`with_overrides`)
//!
//! All persistent state lives under the workspace's `.insight/` directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

const KNOWN_LLM_PROVIDERS: &[&str] = &["ollama"];
const KNOWN_EMBEDDING_PROVIDERS: &[&str] = &["ollama", "trigram"];
/// Accepted case-insensitively; `euclidean` is an alias for `l2`.
const KNOWN_METRICS: &[&str] = &["cosine", "l2", "euclidean"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Workspace root (contains `.insight/`)
    pub workspace: PathBuf,

    /// Config file that was merged, if any
    pub config_file: Option<PathBuf>,

    /// Name of the knowledge base under `.insight/knowledge/`
    pub base: String,

    pub llm: LlmSettings,

    pub embedding: EmbeddingSettings,

    pub retrieval: RetrievalSettings,

    /// Prompt definition id under `.insight/prompts/`; built-in template when unset
    pub prompt_id: Option<String>,

    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    pub log_json: bool,

    pub verbose: bool,

    pub no_color: bool,
}

/// Generation model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            temperature: None,
            max_tokens: None,
            timeout_secs: 120,
        }
    }
}

/// Embedding model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    pub provider: String,
    /// Falls back to the LLM endpoint when unset
    pub endpoint: Option<String>,
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: None,
            model: "mxbai-embed-large".to_string(),
            dimensions: 1024,
            batch_size: 32,
            timeout_secs: 60,
        }
    }
}

/// Chunking and search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub metric: String,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            top_k: 10,
            metric: "cosine".to_string(),
        }
    }
}

/// Layout of `.insight/config.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceSection>,
    knowledge: Option<KnowledgeSection>,
    llm: Option<LlmSettings>,
    embedding: Option<EmbeddingSettings>,
    retrieval: Option<RetrievalSettings>,
    prompt: Option<PromptSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KnowledgeSection {
    base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PromptSection {
    id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            base: "default".to_string(),
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            retrieval: RetrievalSettings::default(),
            prompt_id: None,
            log_level: None,
            log_json: false,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration for the current directory.
    ///
    /// Environment variables:
    /// - `INSIGHT_WORKSPACE`: workspace root
    /// - `INSIGHT_CONFIG`: config file path
    /// - `INSIGHT_BASE`: knowledge base name
    /// - `INSIGHT_MODEL`: generation model
    /// - `INSIGHT_EMBEDDING_MODEL`: embedding model
    /// - `INSIGHT_TOP_K`: default number of retrieved chunks
    /// - `OLLAMA_URL`: Ollama endpoint
    /// - `RUST_LOG`: log filter
    /// - `NO_COLOR`: disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Load configuration, with explicit workspace and config file taking
    /// precedence over `INSIGHT_WORKSPACE` and `INSIGHT_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| env_path("INSIGHT_WORKSPACE")) {
            config.workspace = workspace;
        }
        config.config_file = config_file.or_else(|| env_path("INSIGHT_CONFIG"));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.insight_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
            config.config_file = Some(config_path);
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(base) = std::env::var("INSIGHT_BASE") {
            self.base = base;
        }
        if let Ok(model) = std::env::var("INSIGHT_MODEL") {
            self.llm.model = model;
        }
        if let Ok(model) = std::env::var("INSIGHT_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.llm.endpoint = url;
        }
        if let Ok(top_k) = std::env::var("INSIGHT_TOP_K") {
            self.retrieval.top_k = top_k.parse().map_err(|_| {
                AppError::Config(format!("INSIGHT_TOP_K must be a positive integer, got '{}'", top_k))
            })?;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }
        if std::env::var_os("NO_COLOR").is_some() {
            self.no_color = true;
        }
        Ok(())
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }
        if let Some(base) = file.knowledge.and_then(|k| k.base) {
            result.base = base;
        }
        if let Some(llm) = file.llm {
            result.llm = llm;
        }
        if let Some(embedding) = file.embedding {
            result.embedding = embedding;
        }
        if let Some(retrieval) = file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(id) = file.prompt.and_then(|p| p.id) {
            result.prompt_id = Some(id);
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides; flags win over file and environment.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        base: Option<String>,
        model: Option<String>,
        top_k: Option<usize>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        log_json: bool,
    ) -> Self {
        if let Some(base) = base {
            self.base = base;
        }

        if let Some(model) = model {
            self.llm.model = model;
        }

        if let Some(top_k) = top_k {
            self.retrieval.top_k = top_k;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose implies debug unless a level was given explicitly
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if log_json {
            self.log_json = true;
        }

        self
    }

    /// Path to the `.insight` directory.
    pub fn insight_dir(&self) -> PathBuf {
        self.workspace.join(".insight")
    }

    /// Ensure the `.insight` directory exists.
    pub fn ensure_insight_dir(&self) -> AppResult<()> {
        let dir = self.insight_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .insight directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Endpoint used for embeddings.
    pub fn embedding_endpoint(&self) -> &str {
        self.embedding.endpoint.as_deref().unwrap_or(&self.llm.endpoint)
    }

    /// Check the configuration once, before any component is built.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown LLM provider: {}. Supported: {}",
                self.llm.provider,
                KNOWN_LLM_PROVIDERS.join(", ")
            )));
        }

        if !KNOWN_EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.llm.model.trim().is_empty() || self.embedding.model.trim().is_empty() {
            return Err(AppError::Config("Model names must not be empty".to_string()));
        }

        if self.embedding.dimensions == 0 || self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "Embedding dimensions and batch size must be positive".to_string(),
            ));
        }

        let retrieval = &self.retrieval;
        if retrieval.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be positive".to_string()));
        }
        if retrieval.chunk_overlap >= retrieval.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                retrieval.chunk_overlap, retrieval.chunk_size
            )));
        }
        if retrieval.top_k == 0 {
            return Err(AppError::Config("topK must be at least 1".to_string()));
        }
        if !KNOWN_METRICS.contains(&retrieval.metric.to_ascii_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "Unknown metric: {}. Supported: {}",
                retrieval.metric,
                KNOWN_METRICS.join(", ")
            )));
        }

        if self.base.is_empty() || self.base.contains(['/', '\\']) || self.base.starts_with('.') {
            return Err(AppError::Config(format!(
                "Invalid knowledge base name: '{}'",
                self.base
            )));
        }

        Ok(())
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).map(PathBuf::from)
}
