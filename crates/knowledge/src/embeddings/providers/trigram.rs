//! Offline hashing embedder over words and character trigrams.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use insight_core::AppResult;

use crate::embeddings::provider::EmbeddingProvider;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "how", "much", "many", "will", "what", "when", "where",
    "who", "why", "does", "did", "can", "could", "would", "should", "about", "there", "been",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Deterministic feature-hashing embeddings.
///
/// Each content word contributes its own hashed feature plus one feature per
/// character trigram, so inflections ("rise", "rises") still overlap. Vectors
/// are L2-normalized. Output depends only on the input text and the
/// dimension, which makes it suitable for offline use and tests.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return embedding;
        }

        // BTreeMap keeps accumulation order fixed, so sums are bit-identical.
        let mut word_freq: BTreeMap<String, u32> = BTreeMap::new();
        for word in tokenize(text) {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let freq = *freq as f32;

            let slot = (feature_hash(b'w', word.as_bytes()) % self.dimensions as u64) as usize;
            embedding[slot] += freq;

            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let slot =
                    (feature_hash(b't', trigram.as_bytes()) % self.dimensions as u64) as usize;
                embedding[slot] += freq.sqrt();
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

/// Lowercased alphanumeric words of three or more characters, minus stop words.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(|w| w.to_lowercase())
        .filter(|w| !stop_words().contains(w.as_str()))
}

/// FNV-1a over a namespace byte followed by the feature bytes.
fn feature_hash(namespace: u8, bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    std::iter::once(namespace)
        .chain(bytes.iter().copied())
        .fold(OFFSET, |hash, b| (hash ^ b as u64).wrapping_mul(PRIME))
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
