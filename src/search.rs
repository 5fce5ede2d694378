//! Nearest-document search without generation.
//!
//! Used by the `prag search` command to inspect what retrieval would hand
//! the generator for a given text.

use anyhow::Result;
use serde::Serialize;

use portfolio_rag_core::models::Attribution;
use portfolio_rag_core::pipeline::Pipeline;

use crate::app::build_pipeline;
use crate::config::Config;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub rank: usize,
    /// Squared L2 distance from the query embedding.
    pub distance: f32,
    pub source: Attribution,
    pub content: String,
}

/// Nearest `k` documents for `text`, nearest first.
pub async fn search_documents(pipeline: &Pipeline, text: &str, k: i64) -> Result<Vec<SearchResult>> {
    let hits = pipeline.retrieve(text, k).await?;
    Ok(hits
        .iter()
        .enumerate()
        .map(|(i, hit)| SearchResult {
            rank: i + 1,
            distance: hit.distance,
            source: hit.document.attribution.clone(),
            content: hit.document.content.clone(),
        })
        .collect())
}

pub async fn run_search(config: &Config, text: &str, k: Option<i64>, json: bool) -> Result<()> {
    if text.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let pipeline = build_pipeline(config).await?;
    let k = k.unwrap_or(config.retrieval.default_top_k);
    let results = search_documents(&pipeline, text, k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for result in &results {
        println!(
            "{}. [{:.4}] {} row {}",
            result.rank, result.distance, result.source.file, result.source.row_index
        );
        println!("    {}", result.content);
        println!();
    }

    Ok(())
}
