//! Fixed-window text chunking with overlap.
//!
//! Windows are measured in characters (Unicode scalar values), so a chunk
//! never splits a multi-byte sequence.

use insight_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::types::{Chunk, Document};

/// Validated chunk size and overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkingParams {
    /// Requires `chunk_size > 0` and `overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be positive".to_string()));
        }
        if overlap >= chunk_size {
            return Err(AppError::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between consecutive window starts.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Split a document into overlapping chunks.
///
/// Chunk `i` covers characters `[i * step, i * step + chunk_size)`, clipped
/// at the end of the text. Splitting stops at the first window that reaches
/// the end, so the last chunk may be shorter than `chunk_size`. Text is kept
/// exactly as is; an empty document yields no chunks.
pub fn split(document: &Document, params: &ChunkingParams) -> Vec<Chunk> {
    let text = &document.text;
    // Byte offset of every char, plus the end of the text.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < char_count {
        let end = (start + params.chunk_size).min(char_count);
        let position = chunks.len();

        chunks.push(Chunk {
            id: Chunk::make_id(&document.id, position),
            document_id: document.id.clone(),
            position,
            text: text[boundaries[start]..boundaries[end]].to_string(),
            start,
            end,
            page: document.page_at(start),
        });

        if end == char_count {
            break;
        }
        start += params.step();
    }

    tracing::debug!(
        document = %document.id,
        chunks = chunks.len(),
        chunk_size = params.chunk_size,
        overlap = params.overlap,
        "Chunked document"
    );

    chunks
}

/// Split every document, keeping corpus order.
pub fn split_corpus(documents: &[Document], params: &ChunkingParams) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| split(doc, params))
        .collect()
}
