//! Exact nearest-neighbour vector index.
//!
//! The index embeds every [`Document`] once at startup and is read-only
//! afterwards, so it can be shared across concurrent requests without
//! locking. Search is brute-force squared-L2 over all stored vectors.
//!
//! Ordinal `i` in the index always refers to `documents[i]`; results are
//! ordered by ascending distance with ties broken by ordinal, which makes
//! repeated searches with the same query return identical sequences.

use anyhow::{bail, Result};
use tracing::debug;

use crate::embedding::{l2_distance_squared, Embedder};
use crate::models::Document;

/// Number of documents sent to the embedder per call during [`VectorIndex::build`].
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// A document returned by [`VectorIndex::search_with_distances`].
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    /// Position of the document in the index.
    pub ordinal: usize,
    /// Squared L2 distance from the query embedding.
    pub distance: f32,
    pub document: &'a Document,
}

/// Read-only exact L2 index over materialized documents.
#[derive(Debug, Default)]
pub struct VectorIndex {
    documents: Vec<Document>,
    vectors: Vec<Vec<f32>>,
    dims: usize,
}

impl VectorIndex {
    /// An index with no documents; every search returns nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Embed `documents` and build the index.
    pub async fn build(embedder: &dyn Embedder, documents: Vec<Document>) -> Result<Self> {
        Self::build_with_batch_size(embedder, documents, DEFAULT_BATCH_SIZE).await
    }

    /// Like [`build`](Self::build), with an explicit embedding batch size.
    ///
    /// Fails if the embedder returns the wrong number of vectors, vectors
    /// of inconsistent dimension, or vectors whose dimension differs from
    /// [`Embedder::dims`].
    pub async fn build_with_batch_size(
        embedder: &dyn Embedder,
        documents: Vec<Document>,
        batch_size: usize,
    ) -> Result<Self> {
        if documents.is_empty() {
            return Ok(Self::empty());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size.max(1)) {
            let embedded = embedder.embed_batch(batch).await?;
            if embedded.len() != batch.len() {
                bail!(
                    "Embedder returned {} vectors for {} documents",
                    embedded.len(),
                    batch.len()
                );
            }
            vectors.extend(embedded);
        }

        let dims = vectors[0].len();
        if dims == 0 {
            bail!("Embedder returned zero-length vectors");
        }
        if dims != embedder.dims() {
            bail!(
                "Embedder {} declares {} dimensions but returned {}",
                embedder.model_name(),
                embedder.dims(),
                dims
            );
        }
        if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dims) {
            bail!(
                "Embedding dimension mismatch at document {}: expected {}, got {}",
                i,
                dims,
                v.len()
            );
        }

        debug!(
            documents = documents.len(),
            dims,
            model = embedder.model_name(),
            "built vector index"
        );

        Ok(Self {
            documents,
            vectors,
            dims,
        })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Vector dimension, or `0` for an empty index.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Up to `min(k, len)` nearest documents, nearest first.
    ///
    /// `k <= 0` and an empty index both yield an empty result without
    /// calling the embedder.
    pub async fn search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: i64,
    ) -> Result<Vec<&Document>> {
        Ok(self
            .search_with_distances(embedder, query, k)
            .await?
            .into_iter()
            .map(|hit| hit.document)
            .collect())
    }

    /// Like [`search`](Self::search), keeping ordinals and distances.
    pub async fn search_with_distances(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: i64,
    ) -> Result<Vec<SearchHit<'_>>> {
        if k <= 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = embedder.embed(query).await?;
        if query_vec.len() != self.dims {
            bail!(
                "Query embedding has dimension {}, index has {}",
                query_vec.len(),
                self.dims
            );
        }

        let mut hits: Vec<SearchHit<'_>> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(ordinal, v)| SearchHit {
                ordinal,
                distance: l2_distance_squared(&query_vec, v),
                document: &self.documents[ordinal],
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.ordinal.cmp(&b.ordinal))
        });
        hits.truncate((k as usize).min(self.documents.len()));

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Attribution;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Maps the first character's code to a 1-d vector, counting calls.
    struct PositionEmbedder {
        calls: AtomicUsize,
    }

    impl PositionEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for PositionEmbedder {
        fn model_name(&self) -> &str {
            "position"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.chars().next().map(|c| c as u32 as f32).unwrap_or(0.0)])
                .collect())
        }
    }

    fn doc(content: &str, row: usize) -> Document {
        Document {
            content: content.to_string(),
            attribution: Attribution::new("trades.csv", row),
        }
    }

    #[tokio::test]
    async fn test_search_returns_all_when_k_equals_len() {
        let embedder = PositionEmbedder::new();
        let docs = vec![doc("a", 0), doc("m", 1), doc("z", 2)];
        let index = VectorIndex::build(&embedder, docs).await.unwrap();

        let hits = index
            .search_with_distances(&embedder, "n", 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        assert_eq!(hits[0].document.content, "m");
    }

    #[tokio::test]
    async fn test_k_larger_than_index_is_capped() {
        let embedder = PositionEmbedder::new();
        let index = VectorIndex::build(&embedder, vec![doc("a", 0), doc("b", 1)])
            .await
            .unwrap();
        let docs = index.search(&embedder, "a", 20).await.unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty() {
        let embedder = PositionEmbedder::new();
        let index = VectorIndex::build(&embedder, Vec::new()).await.unwrap();
        assert!(index.is_empty());
        assert!(index.search(&embedder, "anything", 5).await.unwrap().is_empty());
        assert!(VectorIndex::empty()
            .search(&embedder, "anything", 5)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_positive_k_returns_empty() {
        let embedder = PositionEmbedder::new();
        let index = VectorIndex::build(&embedder, vec![doc("a", 0)]).await.unwrap();
        assert!(index.search(&embedder, "a", 0).await.unwrap().is_empty());
        assert!(index.search(&embedder, "a", -3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ties_broken_by_ordinal() {
        let embedder = PositionEmbedder::new();
        let docs = vec![doc("b", 0), doc("b", 1), doc("b", 2)];
        let index = VectorIndex::build(&embedder, docs).await.unwrap();
        let hits = index
            .search_with_distances(&embedder, "b", 3)
            .await
            .unwrap();
        let ordinals: Vec<usize> = hits.iter().map(|h| h.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_repeated_search_is_deterministic() {
        let embedder = PositionEmbedder::new();
        let docs = vec![doc("c", 0), doc("x", 1), doc("e", 2), doc("d", 3)];
        let index = VectorIndex::build(&embedder, docs).await.unwrap();
        let first = index.search(&embedder, "d", 3).await.unwrap();
        let second = index.search(&embedder, "d", 3).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_build_batches_documents() {
        let embedder = PositionEmbedder::new();
        let docs = (0..5).map(|i| doc("q", i)).collect();
        let index = VectorIndex::build_with_batch_size(&embedder, docs, 2)
            .await
            .unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(index.dims(), 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]])
        }
    }

    #[tokio::test]
    async fn test_build_rejects_missing_vectors() {
        let err = VectorIndex::build(&ShortEmbedder, vec![doc("a", 0), doc("b", 1)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("returned 1 vectors for 2"));
    }

    struct MisdeclaredEmbedder;

    #[async_trait]
    impl Embedder for MisdeclaredEmbedder {
        fn model_name(&self) -> &str {
            "misdeclared"
        }
        fn dims(&self) -> usize {
            384
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.5, 0.5]).collect())
        }
    }

    #[tokio::test]
    async fn test_build_rejects_dims_mismatch() {
        let err = VectorIndex::build(&MisdeclaredEmbedder, vec![doc("a", 0)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("declares 384 dimensions but returned 2"));
    }
}
