//! Read-only tabular datasets.
//!
//! A [`Table`] is a rectangular grid of typed [`Cell`]s under named
//! columns. Tables are built once at load time and never mutated, so
//! every row index handed out in an [`Attribution`](crate::models::Attribution)
//! stays valid for the life of the process.

use std::fmt;

use thiserror::Error;

use crate::models::{HOLDINGS_FILE, TRADES_FILE};

/// A single typed table value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
}

/// Field spellings read as missing values, matched exactly after trimming.
pub const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-NaN", "-nan", "<NA>", "N/A", "NA", "NULL", "NaN", "None",
    "n/a", "nan", "null",
];

impl Cell {
    /// Type a raw field: NA token → null, finite number → number, else text.
    ///
    /// Spellings like `inf` or `Infinity` stay text; they are more likely a
    /// ticker or a name than a value.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if NA_TOKENS.contains(&trimmed) {
            return Cell::Null;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// Raised when a numeric computation meets a value it cannot use.
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("column '{column}' row {row}: expected a number, found '{value}'")]
    NotNumeric {
        column: String,
        row: usize,
        value: String,
    },
}

/// Rectangular table of named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table. Short rows are padded with nulls and long rows are
    /// cut to the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        &self.rows[row][column]
    }

    /// Index of the column whose name equals `name`, ignoring case.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Index of the first column whose lower-cased name satisfies `pred`.
    pub fn find_column(&self, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| pred(&c.to_lowercase()))
    }

    /// `(row, value)` for every non-null cell of a numeric column.
    ///
    /// A text cell is a computation fault, not a skipped value.
    pub fn numbers(&self, column: usize) -> Result<Vec<(usize, f64)>, TableError> {
        let mut out = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            match &row[column] {
                Cell::Null => {}
                Cell::Number(n) => out.push((i, *n)),
                Cell::Text(s) => {
                    return Err(TableError::NotNumeric {
                        column: self.columns[column].clone(),
                        row: i,
                        value: s.clone(),
                    })
                }
            }
        }
        Ok(out)
    }
}

/// The two datasets the system answers questions about.
#[derive(Debug, Clone, Default)]
pub struct Datasets {
    pub holdings: Table,
    pub trades: Table,
}

impl Datasets {
    /// Tables paired with their file labels, holdings first.
    pub fn labelled(&self) -> [(&'static str, &Table); 2] {
        [(HOLDINGS_FILE, &self.holdings), (TRADES_FILE, &self.trades)]
    }

    /// Total row count across both tables.
    pub fn total_rows(&self) -> usize {
        self.holdings.len() + self.trades.len()
    }
}
