//! Embedding capability trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! plus the distance function used by the vector index.
//!
//! Concrete providers (feature hashing, OpenAI, Ollama, fastembed) live in
//! the `portfolio-rag` app crate.

use anyhow::Result;
use async_trait::async_trait;

/// Text → vector capability.
///
/// The same instance must be used to build the index and to embed queries,
/// otherwise distances are meaningless.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}

/// Squared Euclidean distance between two vectors.
///
/// Squaring preserves the ordering of true L2 distance, which is all
/// nearest-neighbour search needs. Vectors of different lengths are
/// infinitely far apart.
pub fn l2_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
