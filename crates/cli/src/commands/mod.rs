//! Command handlers for the Climate Insight CLI.

pub mod ask;
pub mod index;
pub mod ingest;

pub use ask::AskCommand;
pub use index::IndexCommand;
pub use ingest::IngestCommand;
