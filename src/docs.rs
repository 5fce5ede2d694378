//! Materialized document listing.
//!
//! `prag docs` prints the exact text each row is indexed as. It only loads
//! the CSVs; no embedder is created.

use anyhow::{bail, Result};

use portfolio_rag_core::materialize::{materialize, materialize_all};
use portfolio_rag_core::models::{Document, HOLDINGS_FILE, TRADES_FILE};

use crate::config::Config;
use crate::dataset::load_datasets;

/// Documents for one dataset (`holdings` / `trades`) or both, truncated to `limit`.
pub fn list_documents(config: &Config, file: Option<&str>, limit: Option<usize>) -> Result<Vec<Document>> {
    let datasets = load_datasets(&config.data)?;

    let mut documents = match file {
        None => materialize_all(&datasets),
        Some("holdings") => materialize(&datasets.holdings, HOLDINGS_FILE),
        Some("trades") => materialize(&datasets.trades, TRADES_FILE),
        Some(other) => bail!("Unknown file: {}. Use holdings or trades.", other),
    };

    if let Some(limit) = limit {
        documents.truncate(limit);
    }
    Ok(documents)
}

pub fn run_docs(config: &Config, file: Option<&str>, limit: Option<usize>) -> Result<()> {
    let documents = list_documents(config, file, limit)?;
    if documents.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for doc in &documents {
        println!("{}", doc.content);
    }
    Ok(())
}
