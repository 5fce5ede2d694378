//! # Portfolio RAG
//!
//! A chat service answering natural-language questions about two tabular
//! datasets: portfolio holdings and trade history.
//!
//! Questions that ask for a computable aggregate (top holdings by value,
//! total PnL, net position in a symbol, trade count, average price) are
//! answered exactly from the tables. Everything else goes through
//! retrieval-augmented generation over one document per table row, with
//! every answer carrying the rows it was derived from.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │ CSV data │──▶│ Materialize │──▶│ Vector index │
//! └──────────┘   └─────────────┘   └──────┬───────┘
//!                                         │
//!   question ──▶ Router ──▶ Aggregation   │
//!                  │                      ▼
//!                  └──────▶ Retrieval ──▶ Generator
//! ```
//!
//! The pure pipeline lives in `portfolio-rag-core`; this crate adds
//! configuration, CSV loading, model providers, sessions, the HTTP API and
//! the `prag` CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! prag docs --limit 5                 # show materialized rows
//! prag ask "total pnl"                # one-shot question
//! prag search "MSFT trades" --k 3     # nearest rows with distances
//! prag serve                          # start the chat API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`dataset`] | CSV loading |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Text-generation providers |
//! | [`app`] | Pipeline bootstrap |
//! | [`session`] | In-memory chat history |
//! | [`server`] | HTTP chat API |
//! | [`ask`], [`search`], [`docs`] | CLI commands |

pub mod app;
pub mod ask;
pub mod config;
pub mod dataset;
pub mod docs;
pub mod embedding;
pub mod generation;
pub mod search;
pub mod server;
pub mod session;
