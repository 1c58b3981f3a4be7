//! Knowledge base paths and validated runtime settings.

use std::path::{Path, PathBuf};

use insight_core::{AppConfig, AppError, AppResult};

use crate::chunker::ChunkingParams;
use crate::index::Metric;

const INDEX_FILE: &str = "index.sqlite";

/// Get the base directory for a knowledge base.
pub fn get_base_dir(workspace: &Path, base_name: &str) -> PathBuf {
    workspace
        .join(".insight")
        .join("knowledge")
        .join(base_name)
}

/// Get the path to a base's persisted index.
pub fn get_index_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join(INDEX_FILE)
}

/// Settings the pipeline needs, checked once up front.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeSettings {
    pub chunking: ChunkingParams,
    pub default_k: usize,
    pub metric: Metric,
    pub index_path: PathBuf,
}

impl KnowledgeSettings {
    pub fn new(chunking: ChunkingParams, default_k: usize, metric: Metric, index_path: PathBuf) -> AppResult<Self> {
        if default_k == 0 {
            return Err(AppError::Config("top_k must be at least 1".to_string()));
        }

        Ok(Self {
            chunking,
            default_k,
            metric,
            index_path,
        })
    }

    /// Derive settings from application config.
    pub fn from_app(config: &AppConfig) -> AppResult<Self> {
        if config.base.trim().is_empty() || config.base.contains(['/', '\\']) {
            return Err(AppError::Config(format!(
                "Invalid knowledge base name '{}'",
                config.base
            )));
        }

        let retrieval = &config.retrieval;
        let chunking = ChunkingParams::new(retrieval.chunk_size, retrieval.chunk_overlap)?;
        let metric: Metric = retrieval.metric.parse()?;

        Self::new(
            chunking,
            retrieval.top_k,
            metric,
            get_index_path(&config.workspace, &config.base),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let ws = Path::new("/work");
        assert_eq!(
            get_index_path(ws, "climate"),
            PathBuf::from("/work/.insight/knowledge/climate/index.sqlite")
        );
        assert_eq!(
            get_base_dir(ws, "climate"),
            PathBuf::from("/work/.insight/knowledge/climate")
        );
    }

    #[test]
    fn test_from_app_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_from(Some(dir.path().to_path_buf()), None).unwrap();

        let settings = KnowledgeSettings::from_app(&config).unwrap();
        assert_eq!(settings.chunking.chunk_size(), config.retrieval.chunk_size);
        assert_eq!(settings.default_k, config.retrieval.top_k);
        assert_eq!(settings.metric, Metric::Cosine);
        assert!(settings.index_path.starts_with(dir.path()));
    }

    #[test]
    fn test_from_app_rejects_bad_values() {
        let dir = TempDir::new().unwrap();
        let base = AppConfig::load_from(Some(dir.path().to_path_buf()), None).unwrap();

        let mut config = base.clone();
        config.retrieval.chunk_overlap = config.retrieval.chunk_size;
        assert!(matches!(
            KnowledgeSettings::from_app(&config),
            Err(AppError::Config(_))
        ));

        let mut config = base.clone();
        config.retrieval.metric = "manhattan".to_string();
        assert!(matches!(
            KnowledgeSettings::from_app(&config),
            Err(AppError::Config(_))
        ));

        let mut config = base.clone();
        config.retrieval.top_k = 0;
        assert!(matches!(
            KnowledgeSettings::from_app(&config),
            Err(AppError::Config(_))
        ));

        let mut config = base;
        config.base = "../elsewhere".to_string();
        assert!(matches!(
            KnowledgeSettings::from_app(&config),
            Err(AppError::Config(_))
        ));
    }
}
