//! # Portfolio RAG Core
//!
//! Shared, I/O-free logic for Portfolio RAG: the tabular data model,
//! document materialization, the exact L2 vector index, the aggregation
//! resolver, the query router and grounding-prompt assembly.
//!
//! This crate contains no tokio, HTTP, filesystem I/O, or model runtime
//! dependencies. Embedding and generation models are consumed through the
//! [`embedding::Embedder`] and [`generate::Generator`] traits, which the
//! application crate implements for real providers and tests implement
//! with deterministic stubs.
//!
//! ## Control flow
//!
//! ```text
//! question ──▶ router ──┬──▶ aggregate (fast path) ─────────────┐
//!                       │                                       ▼
//!                       └──▶ index.search ──▶ generate ──▶ (answer, sources)
//! ```

pub mod aggregate;
pub mod embedding;
pub mod generate;
pub mod index;
pub mod materialize;
pub mod models;
pub mod pipeline;
pub mod router;
pub mod table;
