//! Test-only deterministic embedder.

use std::sync::atomic::{AtomicUsize, Ordering};

use lexrag_core::LexError;

use crate::embedding::Embedder;

/// Hashed bag-of-words embedder.
///
/// Each lowercase alphanumeric token is hashed (FNV-1a) into one of
/// `dimensions` buckets and the vector is L2-normalised, so identical texts
/// have cosine similarity `1.0` and texts sharing words score higher than
/// unrelated ones.
#[derive(Debug)]
pub struct MockEmbedder {
    dimensions: usize,
    model: String,
    calls: AtomicUsize,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model: "mock-bag-of-words".into(),
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.into();
        self
    }

    /// Number of `embed_batch`/`embed_query` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = fnv1a(&token.to_lowercase()) as usize % self.dimensions;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

impl Embedder for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, LexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector(query))
    }

    fn model(&self) -> &str {
        &self.model
    }
}
