//! In-memory exact nearest-neighbor index.
//!
//! Entries keep insertion order. Search scores every entry and sorts with a
//! stable sort, so equal scores come back in insertion order.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use insight_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::types::{Chunk, RetrievalResult, ScoredChunk};

/// Similarity metric, fixed when the index is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity
    #[default]
    Cosine,
    /// Negative Euclidean distance, so larger is still closer
    L2,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::L2 => "l2",
        }
    }

    /// Similarity score; higher means more similar.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::L2 => -euclidean_distance(a, b),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "l2" | "euclidean" => Ok(Metric::L2),
            other => Err(AppError::Config(format!(
                "Unknown metric '{}'. Supported: cosine, l2",
                other
            ))),
        }
    }
}

/// A chunk and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Exact k-NN index over chunk embeddings. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    metric: Metric,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Pair chunks with vectors, in order.
    ///
    /// Fails with `DimensionMismatch` when the counts differ or the vectors
    /// are not all the same length. Nothing is truncated.
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>, metric: Metric) -> AppResult<Self> {
        if chunks.len() != vectors.len() {
            return Err(AppError::DimensionMismatch(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        ensure_unique_ids(&chunks)?;

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some((i, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != dimension)
        {
            return Err(AppError::DimensionMismatch(format!(
                "vector {} has length {}, expected {}",
                i,
                v.len(),
                dimension
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect::<Vec<_>>();

        tracing::debug!(
            entries = entries.len(),
            dimension,
            metric = %metric,
            "Built vector index"
        );

        Ok(Self {
            dimension,
            metric,
            entries,
        })
    }

    /// Up to `k` most similar chunks, best first.
    pub fn search(&self, query: &[f32], k: usize) -> AppResult<RetrievalResult> {
        if k == 0 {
            return Err(AppError::Config("k must be at least 1".to_string()));
        }

        if self.entries.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        if query.len() != self.dimension {
            return Err(AppError::DimensionMismatch(format!(
                "query vector has length {}, index dimension is {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let score = self.metric.score(query, &entry.vector);
                // Overflowing vectors score NaN; rank them last.
                (i, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();

        // Stable: ties keep insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        tracing::debug!(
            "Retrieved {} chunks (requested top-{})",
            scored.len(),
            k
        );

        Ok(RetrievalResult::new(
            scored
                .into_iter()
                .map(|(i, score)| ScoredChunk {
                    chunk: self.entries[i].chunk.clone(),
                    score,
                })
                .collect(),
        ))
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

/// Cosine similarity; 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Rejects chunk lists where two chunks share an id.
pub fn ensure_unique_ids(chunks: &[Chunk]) -> AppResult<()> {
    let mut seen = HashSet::with_capacity(chunks.len());
    match chunks.iter().find(|chunk| !seen.insert(chunk.id.as_str())) {
        Some(chunk) => Err(AppError::Document(format!(
            "Duplicate chunk id '{}' (document '{}' appears more than once)",
            chunk.id, chunk.document_id
        ))),
        None => Ok(()),
    }
}
