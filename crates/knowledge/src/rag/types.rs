//! Answer and query types.

use serde::{Deserialize, Serialize};

use crate::types::RetrievalResult;

/// Maximum snippet length for source references, in characters.
pub const MAX_SNIPPET_LENGTH: usize = 150;

/// A generated answer together with the retrieval it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Model output, verbatim
    pub text: String,

    pub retrieval: RetrievalResult,

    /// Model that produced the text
    pub model: String,

    /// Prompt definition used to build the request
    pub prompt_id: String,
}

impl Answer {
    /// Human-readable references for every retrieved chunk, best first.
    pub fn sources(&self) -> Vec<SourceRef> {
        self.retrieval
            .iter()
            .map(|hit| SourceRef {
                chunk_id: hit.chunk.id.clone(),
                document: hit.chunk.document_id.clone(),
                page: hit.chunk.page,
                score: hit.score,
                snippet: truncate_snippet(&hit.chunk.text, MAX_SNIPPET_LENGTH),
            })
            .collect()
    }

    pub fn into_response(self) -> QueryResponse {
        QueryResponse {
            sources: self.retrieval.chunk_ids(),
            result: self.text,
        }
    }
}

/// Where part of an answer came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub chunk_id: String,

    /// Document the chunk was cut from
    pub document: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    pub score: f32,

    /// Start of the chunk text, cut at a word boundary
    pub snippet: String,
}

/// Query endpoint input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(alias = "query")]
    pub question: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// Query endpoint output: the answer and the ids of the chunks behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub result: String,
    pub sources: Vec<String>,
}

/// Truncate to at most `max_chars` characters, preferring a word boundary.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let cut = match text.char_indices().nth(max_chars) {
        Some((byte, _)) => byte,
        None => return text.to_string(),
    };

    let truncated = &text[..cut];
    match truncated.rfind(char::is_whitespace) {
        Some(last_space) if last_space > 0 => format!("{}...", truncated[..last_space].trim_end()),
        _ => format!("{}...", truncated),
    }
}
