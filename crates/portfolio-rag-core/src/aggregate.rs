//! Aggregation resolver: answers numeric questions straight from the tables.
//!
//! Intent detection is an ordered list of [`Template`]s, each a
//! `(predicate, handler)` pair. Templates are tried top to bottom:
//!
//! | # | Intent | Trigger words |
//! |---|--------|---------------|
//! | 1 | [`Intent::TopHoldings`] | `top` + `holding` |
//! | 2 | [`Intent::TotalPnl`] | `total` + (`pnl` \| `profit`) |
//! | 3 | [`Intent::NetPosition`] | `net` + `position` |
//! | 4 | [`Intent::TradeCount`] | `how many` + `trade` |
//! | 5 | [`Intent::AveragePrice`] | (`average` \| `avg`) + `price` |
//!
//! The first template that both matches and produces an answer wins. A
//! template that matches but cannot find its columns (or, for net
//! position, any rows for the symbol) passes to the next one. A
//! computation fault stops resolution and yields no match, so the caller
//! falls back to retrieval instead of failing the request.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::models::{Attribution, HOLDINGS_FILE, TRADES_FILE};
use crate::table::{Cell, Datasets, Table, TableError};

/// Rows listed by top-N when the question names no count.
pub const DEFAULT_TOP_N: usize = 5;

/// Maximum attributions reported for a total over all trades.
pub const MAX_TOTAL_SOURCES: usize = 10;

/// Which aggregation answered a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TopHoldings,
    TotalPnl,
    NetPosition,
    TradeCount,
    AveragePrice,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::TopHoldings => "top_holdings",
            Intent::TotalPnl => "total_pnl",
            Intent::NetPosition => "net_position",
            Intent::TradeCount => "trade_count",
            Intent::AveragePrice => "average_price",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A computed answer with the rows it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub intent: Intent,
    pub answer: String,
    pub sources: Vec<Attribution>,
}

/// Faults raised while computing an aggregate.
#[derive(Debug, Error, PartialEq)]
pub enum AggregateError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("aggregate over column '{0}' is not finite")]
    NotFinite(String),
}

/// A question prepared for template matching.
#[derive(Debug, Clone)]
pub struct Question<'a> {
    raw: &'a str,
    lower: String,
}

impl<'a> Question<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            lower: raw.to_lowercase(),
        }
    }

    pub fn raw(&self) -> &str {
        self.raw
    }

    /// Case-insensitive substring test.
    pub fn mentions(&self, needle: &str) -> bool {
        self.lower.contains(needle)
    }

    fn mentions_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.mentions(n))
    }
}

type Handler = fn(&Question<'_>, &Datasets) -> Result<Option<Aggregation>, AggregateError>;

/// One `(predicate, handler)` pair.
pub struct Template {
    pub intent: Intent,
    predicate: fn(&Question<'_>) -> bool,
    handler: Handler,
}

impl Template {
    pub fn matches(&self, question: &Question<'_>) -> bool {
        (self.predicate)(question)
    }

    /// Run the handler. `Ok(None)` means "matched, but nothing to report".
    pub fn compute(
        &self,
        question: &Question<'_>,
        datasets: &Datasets,
    ) -> Result<Option<Aggregation>, AggregateError> {
        (self.handler)(question, datasets)
    }
}

/// The templates in evaluation order. Order is the tie-break policy.
pub static TEMPLATES: [Template; 5] = [
    Template {
        intent: Intent::TopHoldings,
        predicate: wants_top_holdings,
        handler: top_holdings,
    },
    Template {
        intent: Intent::TotalPnl,
        predicate: wants_total_pnl,
        handler: total_pnl,
    },
    Template {
        intent: Intent::NetPosition,
        predicate: wants_net_position,
        handler: net_position,
    },
    Template {
        intent: Intent::TradeCount,
        predicate: wants_trade_count,
        handler: trade_count,
    },
    Template {
        intent: Intent::AveragePrice,
        predicate: wants_average_price,
        handler: average_price,
    },
];

// ============ Predicates ============

fn wants_top_holdings(q: &Question<'_>) -> bool {
    q.mentions("top") && q.mentions("holding")
}

fn wants_total_pnl(q: &Question<'_>) -> bool {
    q.mentions("total") && q.mentions_any(&["pnl", "profit"])
}

fn wants_net_position(q: &Question<'_>) -> bool {
    q.mentions("net") && q.mentions("position")
}

fn wants_trade_count(q: &Question<'_>) -> bool {
    q.mentions("how many") && q.mentions("trade")
}

fn wants_average_price(q: &Question<'_>) -> bool {
    q.mentions_any(&["average", "avg"]) && q.mentions("price")
}

/// Resolves aggregation questions against a fixed pair of datasets.
pub struct Resolver<'a> {
    datasets: &'a Datasets,
}

impl<'a> Resolver<'a> {
    pub fn new(datasets: &'a Datasets) -> Self {
        Self { datasets }
    }

    /// First template answer for `question`, or `None` for "no match".
    pub fn resolve(&self, question: &str) -> Option<Aggregation> {
        let q = Question::new(question);
        for template in TEMPLATES.iter() {
            if !template.matches(&q) {
                continue;
            }
            match template.compute(&q, self.datasets) {
                Ok(Some(aggregation)) => return Some(aggregation),
                Ok(None) => continue,
                Err(e) => {
                    warn!(intent = %template.intent, error = %e, "aggregation failed, falling back to retrieval");
                    return None;
                }
            }
        }
        None
    }
}

// ============ Handlers ============

fn top_holdings(q: &Question<'_>, datasets: &Datasets) -> Result<Option<Aggregation>, AggregateError> {
    let holdings = &datasets.holdings;
    let value_col = match holdings
        .column("value")
        .or_else(|| holdings.find_column(|c| c.contains("value")))
    {
        Some(c) => c,
        None => return Ok(None),
    };
    let label_col = holdings.column("symbol").unwrap_or(0);
    let n = requested_top_n(q).min(holdings.len());

    let mut ranked = holdings.numbers(value_col)?;
    // Stable sort: equal values keep table order.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(n);

    let rows: Vec<usize> = ranked.iter().map(|(row, _)| *row).collect();
    let columns = if label_col == value_col {
        vec![value_col]
    } else {
        vec![label_col, value_col]
    };

    Ok(Some(Aggregation {
        intent: Intent::TopHoldings,
        answer: format!(
            "Top {} holdings by value:\n{}",
            n,
            render_rows(holdings, &columns, &rows)
        ),
        sources: rows
            .iter()
            .map(|&row| Attribution::new(HOLDINGS_FILE, row))
            .collect(),
    }))
}

fn total_pnl(_q: &Question<'_>, datasets: &Datasets) -> Result<Option<Aggregation>, AggregateError> {
    let trades = &datasets.trades;
    let pnl_col = match trades.find_column(|c| c.contains("pnl") || c.contains("profit")) {
        Some(c) => c,
        None => return Ok(None),
    };

    let total: f64 = trades.numbers(pnl_col)?.iter().map(|(_, v)| v).sum();
    if !total.is_finite() {
        return Err(AggregateError::NotFinite(trades.columns()[pnl_col].clone()));
    }

    Ok(Some(Aggregation {
        intent: Intent::TotalPnl,
        answer: format!(
            "Total PnL: {} (computed from {} trades)",
            format_grouped(total, 2),
            trades.len()
        ),
        sources: (0..trades.len().min(MAX_TOTAL_SOURCES))
            .map(|row| Attribution::new(TRADES_FILE, row))
            .collect(),
    }))
}

fn net_position(q: &Question<'_>, datasets: &Datasets) -> Result<Option<Aggregation>, AggregateError> {
    let trades = &datasets.trades;
    let symbol = match extract_symbol(q.raw()) {
        Some(s) => s,
        None => return Ok(None),
    };
    let (symbol_col, quantity_col) = match (trades.column("symbol"), trades.column("quantity")) {
        (Some(s), Some(qty)) => (s, qty),
        _ => return Ok(None),
    };

    let matched: Vec<usize> = trades
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            row[symbol_col]
                .as_text()
                .is_some_and(|s| s.to_uppercase() == symbol)
        })
        .map(|(i, _)| i)
        .collect();

    // An unknown symbol falls through rather than reporting a zero position.
    if matched.is_empty() {
        return Ok(None);
    }

    let mut net = 0.0;
    for &row in &matched {
        match trades.cell(row, quantity_col) {
            Cell::Null => {}
            Cell::Number(n) => net += n,
            Cell::Text(s) => {
                return Err(TableError::NotNumeric {
                    column: trades.columns()[quantity_col].clone(),
                    row,
                    value: s.clone(),
                }
                .into())
            }
        }
    }

    Ok(Some(Aggregation {
        intent: Intent::NetPosition,
        answer: format!(
            "Net position in {}: {} shares",
            symbol,
            format_grouped(net, 0)
        ),
        sources: matched
            .into_iter()
            .map(|row| Attribution::new(TRADES_FILE, row))
            .collect(),
    }))
}

fn trade_count(_q: &Question<'_>, datasets: &Datasets) -> Result<Option<Aggregation>, AggregateError> {
    let trades = &datasets.trades;
    Ok(Some(Aggregation {
        intent: Intent::TradeCount,
        answer: format!("Total number of trades: {}", trades.len()),
        sources: first_row(trades),
    }))
}

fn average_price(_q: &Question<'_>, datasets: &Datasets) -> Result<Option<Aggregation>, AggregateError> {
    let trades = &datasets.trades;
    let price_col = match trades.find_column(|c| c.contains("price")) {
        Some(c) => c,
        None => return Ok(None),
    };

    let prices = trades.numbers(price_col)?;
    if prices.is_empty() {
        return Ok(None);
    }
    let mean = prices.iter().map(|(_, v)| v).sum::<f64>() / prices.len() as f64;
    if !mean.is_finite() {
        return Err(AggregateError::NotFinite(trades.columns()[price_col].clone()));
    }

    Ok(Some(Aggregation {
        intent: Intent::AveragePrice,
        answer: format!("Average trade price: ${}", format_grouped(mean, 2)),
        sources: first_row(trades),
    }))
}

// ============ Helpers ============

fn top_n_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"top\s+(\d+)").expect("top-n pattern is valid"))
}

fn symbol_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:in|for)\s+([a-z]{1,5})\b").expect("symbol pattern is valid")
    })
}

/// Count following "top", or [`DEFAULT_TOP_N`] when absent or zero.
///
/// Digit runs too long for `usize` saturate; callers cap the count at the
/// table size.
fn requested_top_n(q: &Question<'_>) -> usize {
    let n = top_n_pattern()
        .captures(&q.lower)
        .map(|c| c[1].parse().unwrap_or(usize::MAX))
        .unwrap_or(DEFAULT_TOP_N);
    if n == 0 {
        DEFAULT_TOP_N
    } else {
        n
    }
}

/// Upper-cased 1-5 letter token after the first "in"/"for".
fn extract_symbol(question: &str) -> Option<String> {
    symbol_pattern()
        .captures(question)
        .map(|c| c[1].to_uppercase())
}

fn first_row(table: &Table) -> Vec<Attribution> {
    if table.is_empty() {
        Vec::new()
    } else {
        vec![Attribution::new(TRADES_FILE, 0)]
    }
}

/// Fixed-point rendering with `,` thousands separators.
pub fn format_grouped(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3 + 2);
    if value < 0.0 {
        grouped.push('-');
    }
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}

/// Right-aligned text table of `columns` for `rows`, header first.
fn render_rows(table: &Table, columns: &[usize], rows: &[usize]) -> String {
    let mut grid: Vec<Vec<String>> = Vec::with_capacity(rows.len() + 1);
    grid.push(columns.iter().map(|&c| table.columns()[c].clone()).collect());
    for &row in rows {
        grid.push(columns.iter().map(|&c| table.cell(row, c).to_string()).collect());
    }

    let widths: Vec<usize> = (0..columns.len())
        .map(|i| grid.iter().map(|line| line[i].chars().count()).max().unwrap_or(0))
        .collect();

    grid.iter()
        .map(|line| {
            line.iter()
                .zip(&widths)
                .map(|(text, &w)| format!("{:>w$}", text, w = w))
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
