//! Pipeline bootstrap shared by every command.

use anyhow::{Context, Result};

use portfolio_rag_core::pipeline::Pipeline;

use crate::config::Config;
use crate::dataset::load_datasets;
use crate::embedding::create_embedder;
use crate::generation::create_generator;

/// Load the datasets, create the providers and build the vector index.
///
/// Any failure is fatal: callers must not serve a half-built pipeline.
pub async fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let datasets = load_datasets(&config.data).context("Failed to load datasets")?;
    let embedder = create_embedder(&config.embedding).context("Failed to create embedder")?;
    let generator =
        create_generator(&config.generation).context("Failed to create generator")?;

    tracing::info!(
        embedder = embedder.model_name(),
        generator = generator.model_name(),
        "Building vector index"
    );
    if !config.generation.is_enabled() {
        tracing::warn!("Generation is disabled; only aggregate questions will get answers");
    }

    let pipeline = Pipeline::build(datasets, embedder, generator, config.pipeline_settings())
        .await
        .context("Failed to build vector index")?;

    tracing::info!(
        rows = pipeline.datasets().total_rows(),
        documents = pipeline.index().len(),
        dims = pipeline.index().dims(),
        "Pipeline ready"
    );
    Ok(pipeline)
}

