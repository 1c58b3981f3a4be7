//! Retrieval-augmented answering: prompt assembly and generation.

pub mod answer;
pub mod types;

pub use answer::{assemble, Answerer};
pub use types::{truncate_snippet, Answer, QueryRequest, QueryResponse, SourceRef};
