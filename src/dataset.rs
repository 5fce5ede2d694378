//! CSV dataset loading.
//!
//! Reads the holdings and trades files named in `[data]` into core
//! [`Table`]s. The first record is the header. Empty cells and NA tokens
//! (`NA`, `N/A`, `null`, `NaN`, ...) become nulls, cells parsing as finite
//! floats become numbers, everything else is kept as text. Ragged rows are
//! accepted and padded with nulls.
//!
//! A missing or unreadable file is a startup error; the caller never sees
//! a partially loaded [`Datasets`].

use anyhow::{Context, Result};
use std::path::Path;

use portfolio_rag_core::table::{Cell, Datasets, Table};

use crate::config::DataConfig;

/// Load both tables.
pub fn load_datasets(config: &DataConfig) -> Result<Datasets> {
    let holdings = load_table(&config.holdings)?;
    let trades = load_table(&config.trades)?;
    tracing::info!(
        holdings = holdings.len(),
        trades = trades.len(),
        "Loaded datasets"
    );
    Ok(Datasets { holdings, trades })
}

/// Load one CSV file into a [`Table`].
pub fn load_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        anyhow::bail!("Data file not found: {}", path.display());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("Failed to open data file: {}", path.display()))?;

    let columns: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("Failed to read row {} of {}", i, path.display()))?;
        rows.push(record.iter().map(Cell::parse).collect());
    }

    tracing::debug!(path = %path.display(), columns = columns.len(), rows = rows.len(), "Loaded table");
    Ok(Table::new(columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_table_types_cells() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "holdings.csv",
            "symbol,quantity,value,note\nAAPL,10,1500.5,\nMSFT, 3 ,900,core position\n",
        );
        let table = load_table(&path).unwrap();

        assert_eq!(table.columns(), &["symbol", "quantity", "value", "note"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 0), &Cell::Text("AAPL".to_string()));
        assert_eq!(table.cell(0, 2), &Cell::Number(1500.5));
        assert!(table.cell(0, 3).is_null());
        assert_eq!(table.cell(1, 1), &Cell::Number(3.0));
        assert_eq!(table.cell(1, 3), &Cell::Text("core position".to_string()));
    }

    #[test]
    fn test_inf_symbol_survives_materialization() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "holdings.csv", "symbol,value\nINF,250\nInfinity,NA\n");
        let table = load_table(&path).unwrap();
        assert_eq!(table.cell(0, 0), &Cell::Text("INF".to_string()));
        assert!(table.cell(1, 1).is_null());

        let docs = portfolio_rag_core::materialize::materialize(&table, "holdings.csv");
        assert_eq!(docs[0].content, "FILE: holdings.csv | ROW: 0 | symbol=INF | value=250");
        assert_eq!(docs[1].content, "FILE: holdings.csv | ROW: 1 | symbol=Infinity");
    }

    #[test]
    fn test_load_table_pads_short_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "trades.csv", "symbol,quantity,price\nAAPL,5\n");
        let table = load_table(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.cell(0, 2).is_null());
    }

    #[test]
    fn test_load_table_quoted_fields() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "trades.csv", "symbol,memo\nAAPL,\"bought, then held\"\n");
        let table = load_table(&path).unwrap();
        assert_eq!(table.cell(0, 1), &Cell::Text("bought, then held".to_string()));
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "trades.csv", "symbol,quantity\n");
        let table = load_table(&path).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 2);
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = load_table(&dir.path().join("nope.csv")).unwrap_err();
        assert!(err.to_string().contains("Data file not found"));
    }

    #[test]
    fn test_load_datasets() {
        let dir = TempDir::new().unwrap();
        let config = DataConfig {
            holdings: write(&dir, "holdings.csv", "symbol,value\nAAPL,10\n"),
            trades: write(&dir, "trades.csv", "symbol,quantity\nAAPL,1\nAAPL,2\n"),
        };
        let datasets = load_datasets(&config).unwrap();
        assert_eq!(datasets.holdings.len(), 1);
        assert_eq!(datasets.trades.len(), 2);
        assert_eq!(datasets.total_rows(), 3);
    }
}
