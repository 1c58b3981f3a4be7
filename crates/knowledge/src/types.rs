//! Knowledge type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::store::IndexManifest;

/// Start of a page inside a document's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpan {
    /// 1-based page number
    pub number: u32,

    /// Character offset where the page starts
    pub start: usize,
}

/// A loaded source document. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier, derived from the source path
    pub id: String,

    pub source: PathBuf,

    pub text: String,

    /// Page starts in ascending order; empty when the source has no pages
    pub pages: Vec<PageSpan>,
}

impl Document {
    /// A document without page information.
    pub fn new(id: impl Into<String>, source: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            text: text.into(),
            pages: Vec::new(),
        }
    }

    /// Join pages with a newline, recording where each one starts.
    pub fn from_pages<S: AsRef<str>>(
        id: impl Into<String>,
        source: impl Into<PathBuf>,
        pages: &[S],
    ) -> Self {
        let mut text = String::new();
        let mut spans = Vec::with_capacity(pages.len());
        let mut offset = 0usize;

        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                text.push('\n');
                offset += 1;
            }
            spans.push(PageSpan {
                number: (i + 1) as u32,
                start: offset,
            });
            let page = page.as_ref();
            text.push_str(page);
            offset += page.chars().count();
        }

        Self {
            id: id.into(),
            source: source.into(),
            text,
            pages: spans,
        }
    }

    /// Page containing the given character offset.
    pub fn page_at(&self, offset: usize) -> Option<u32> {
        let idx = self.pages.partition_point(|p| p.start <= offset);
        idx.checked_sub(1).map(|i| self.pages[i].number)
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A contiguous span of a document, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `<document id>#<position>`
    pub id: String,

    pub document_id: String,

    /// Index of the chunk within its document
    pub position: usize,

    pub text: String,

    /// Character range `[start, end)` in the document text
    pub start: usize,
    pub end: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl Chunk {
    pub fn make_id(document_id: &str, position: usize) -> String {
        format!("{}#{}", document_id, position)
    }
}

/// A chunk with its similarity to a query. Higher is more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Ranked search hits for one query, most similar first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn new(hits: Vec<ScoredChunk>) -> Self {
        Self { hits }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredChunk> {
        self.hits.iter()
    }

    /// Chunk texts in rank order.
    pub fn texts(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.chunk.text.as_str()).collect()
    }

    pub fn chunk_ids(&self) -> Vec<String> {
        self.hits.iter().map(|h| h.chunk.id.clone()).collect()
    }

    pub fn top_score(&self) -> Option<f32> {
        self.hits.first().map(|h| h.score)
    }
}

/// Summary of a completed ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub index_path: PathBuf,
    pub corpus_hash: String,
    pub duration_ms: u64,
}

/// Persisted index statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub manifest: IndexManifest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pages_offsets() {
        let doc = Document::from_pages("report", "report.pdf", &["Page one", "Zwei é", "3"]);

        assert_eq!(doc.text, "Page one\nZwei é\n3");
        assert_eq!(
            doc.pages,
            vec![
                PageSpan { number: 1, start: 0 },
                PageSpan { number: 2, start: 9 },
                PageSpan { number: 3, start: 16 },
            ]
        );
    }

    #[test]
    fn test_page_at() {
        let doc = Document::from_pages("r", "r.pdf", &["aaaa", "bbbb"]);

        assert_eq!(doc.page_at(0), Some(1));
        assert_eq!(doc.page_at(4), Some(1));
        assert_eq!(doc.page_at(5), Some(2));
        assert_eq!(doc.page_at(500), Some(2));
        assert_eq!(Document::new("t", "t.txt", "text").page_at(0), None);
    }

    #[test]
    fn test_retrieval_result_accessors() {
        let chunk = |id: &str, text: &str| Chunk {
            id: id.to_string(),
            document_id: "d".to_string(),
            position: 0,
            text: text.to_string(),
            start: 0,
            end: text.chars().count(),
            page: None,
        };
        let result = RetrievalResult::new(vec![
            ScoredChunk { chunk: chunk("d#1", "b"), score: 0.9 },
            ScoredChunk { chunk: chunk("d#0", "a"), score: 0.4 },
        ]);

        assert_eq!(result.texts(), vec!["b", "a"]);
        assert_eq!(result.chunk_ids(), vec!["d#1".to_string(), "d#0".to_string()]);
        assert_eq!(result.top_score(), Some(0.9));
        assert!(RetrievalResult::empty().is_empty());
    }
}
