//! The query pipeline: an explicitly constructed context object.
//!
//! A [`Pipeline`] owns the datasets, the vector index and handles to the
//! embedding and generation models. It is built once, then shared
//! read-only (typically behind an `Arc`) by every request. It holds no
//! session state; callers pass the history window in.
//!
//! [`Pipeline::query`] never fails. Per-query faults degrade into answer
//! text, so a caller always gets `(answer, sources)`.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, warn};

use crate::aggregate::Resolver;
use crate::embedding::Embedder;
use crate::generate::{build_prompt, generate_answer, GenerationParams, Generator, DEFAULT_HISTORY_TURNS};
use crate::index::{SearchHit, VectorIndex, DEFAULT_BATCH_SIZE};
use crate::materialize::materialize_all;
use crate::models::{Attribution, ChatTurn, Document};
use crate::router::{route, Route, Routed};
use crate::table::Datasets;

/// Answer returned when retrieval finds nothing.
pub const NO_DATA_ANSWER: &str = "I don't have any relevant data to answer this question.";

/// Smallest `top_k` accepted by [`Pipeline::query`].
pub const MIN_TOP_K: i64 = 1;
/// Largest `top_k` accepted by [`Pipeline::query`].
pub const MAX_TOP_K: i64 = 20;

/// Tuning knobs for a pipeline, decoupled from application config.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Chat-history turns rendered into the prompt.
    pub history_turns: usize,
    /// Sampling parameters for every generation call.
    pub generation: GenerationParams,
    /// Documents per embedding call during index build.
    pub embed_batch_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            history_turns: DEFAULT_HISTORY_TURNS,
            generation: GenerationParams::default(),
            embed_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Result of one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Attribution>,
    pub route: Route,
}

/// Hybrid aggregation + retrieval pipeline.
pub struct Pipeline {
    datasets: Datasets,
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Materialize `datasets`, embed every document and build the index.
    ///
    /// Any failure here is an initialization fault: the pipeline must not
    /// serve queries half-built.
    pub async fn build(
        datasets: Datasets,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        let documents = materialize_all(&datasets);
        let index = VectorIndex::build_with_batch_size(
            embedder.as_ref(),
            documents,
            settings.embed_batch_size,
        )
        .await?;

        Ok(Self {
            datasets,
            index,
            embedder,
            generator,
            settings,
        })
    }

    pub fn datasets(&self) -> &Datasets {
        &self.datasets
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Nearest documents for `question`, nearest first.
    pub async fn retrieve(&self, question: &str, k: i64) -> Result<Vec<SearchHit<'_>>> {
        self.index
            .search_with_distances(self.embedder.as_ref(), question, k)
            .await
    }

    /// The exact prompt the generator would receive for these inputs.
    pub fn prompt(&self, question: &str, documents: &[&Document], history: &[ChatTurn]) -> String {
        build_prompt(question, documents, history, self.settings.history_turns)
    }

    /// Answer `question`.
    ///
    /// `top_k` is clamped to `[MIN_TOP_K, MAX_TOP_K]`. `history` is the
    /// caller's session history, oldest first; only its tail is used.
    pub async fn query(&self, question: &str, top_k: i64, history: &[ChatTurn]) -> Answer {
        let resolver = Resolver::new(&self.datasets);
        if let Routed::Aggregated(aggregation) = route(question, &resolver) {
            debug!(intent = %aggregation.intent, "answered by aggregation");
            return Answer {
                answer: aggregation.answer,
                sources: aggregation.sources,
                route: Route::Aggregation(aggregation.intent),
            };
        }

        let k = top_k.clamp(MIN_TOP_K, MAX_TOP_K);
        let hits = match self.retrieve(question, k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "retrieval failed");
                return Answer {
                    answer: format!("Error retrieving documents: {}", e),
                    sources: Vec::new(),
                    route: Route::Retrieval,
                };
            }
        };

        if hits.is_empty() {
            debug!("retrieval returned no documents");
            return Answer {
                answer: NO_DATA_ANSWER.to_string(),
                sources: Vec::new(),
                route: Route::NoData,
            };
        }

        let documents: Vec<&Document> = hits.iter().map(|h| h.document).collect();
        debug!(hits = documents.len(), k, "answering from retrieved documents");

        let answer = generate_answer(
            self.generator.as_ref(),
            &self.settings.generation,
            question,
            &documents,
            history,
            self.settings.history_turns,
        )
        .await;

        Answer {
            answer,
            sources: documents.iter().map(|d| d.attribution.clone()).collect(),
            route: Route::Retrieval,
        }
    }
}
