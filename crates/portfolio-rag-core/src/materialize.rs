//! Row-to-document materialization.
//!
//! Every table row becomes one [`Document`] whose content is a flat
//! `FILE: <name> | ROW: <n> | col=val | ...` line. Columns appear in table
//! order and null cells are left out entirely.

use crate::models::{Attribution, Document};
use crate::table::{Datasets, Table};

/// Produce one document per row of `table`, in row order.
///
/// A table with no columns yields zero documents.
pub fn materialize(table: &Table, file: &str) -> Vec<Document> {
    if table.columns().is_empty() {
        return Vec::new();
    }

    table
        .rows()
        .iter()
        .enumerate()
        .map(|(row_index, row)| {
            let mut parts = Vec::with_capacity(row.len() + 2);
            parts.push(format!("FILE: {}", file));
            parts.push(format!("ROW: {}", row_index));
            for (column, cell) in table.columns().iter().zip(row) {
                if !cell.is_null() {
                    parts.push(format!("{}={}", column, cell));
                }
            }
            Document {
                content: parts.join(" | "),
                attribution: Attribution::new(file, row_index),
            }
        })
        .collect()
}

/// Materialize holdings then trades into a single ordered sequence.
pub fn materialize_all(datasets: &Datasets) -> Vec<Document> {
    datasets
        .labelled()
        .into_iter()
        .flat_map(|(file, table)| materialize(table, file))
        .collect()
}
