//! Climate Insight core library.
//!
//! Shared foundations for every crate in the workspace:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging setup
//! - Configuration loading (`.insight/config.yaml`, environment, CLI flags)

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AppConfig, EmbeddingSettings, LlmSettings, RetrievalSettings};
pub use error::{AppError, AppResult};
