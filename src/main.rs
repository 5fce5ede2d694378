//! # Portfolio RAG CLI (`prag`)
//!
//! ## Usage
//!
//! ```bash
//! prag --config ./config/prag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `prag serve` | Start the HTTP chat API |
//! | `prag ask "<question>"` | Answer one question and print its sources |
//! | `prag search "<text>"` | Print the nearest documents with distances |
//! | `prag docs` | Print materialized documents |
//!
//! Logs go to stderr and honour `RUST_LOG` (default `info`), so stdout
//! stays clean for `--json` output.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use portfolio_rag::{ask, config, docs, search, server};

/// Portfolio RAG: chat over holdings and trades.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/prag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "prag",
    about = "Portfolio RAG: answers questions about holdings and trades",
    version,
    long_about = "Answers questions about portfolio holdings and trade history. Aggregate \
    questions are computed exactly from the CSV data; everything else is answered by a \
    language model grounded on the most similar rows."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/prag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat API.
    ///
    /// Loads the datasets and builds the vector index first; binds to
    /// `[server].bind` only once the pipeline is ready.
    Serve,

    /// Answer a single question.
    Ask {
        /// The question.
        question: String,

        /// Documents to retrieve when the question is not an aggregate (1-20).
        #[arg(long)]
        top_k: Option<i64>,

        /// Print the answer, sources and route as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the documents nearest to a text, with L2 distances.
    ///
    /// Runs retrieval only; no aggregation, no generation.
    Search {
        /// Text to embed and search for.
        text: String,

        /// Number of documents to return.
        #[arg(long)]
        k: Option<i64>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print materialized documents.
    Docs {
        /// Restrict to one dataset: `holdings` or `trades`.
        #[arg(long)]
        file: Option<String>,

        /// Maximum number of documents to print.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask {
            question,
            top_k,
            json,
        } => {
            ask::run_ask(&cfg, &question, top_k, json).await?;
        }
        Commands::Search { text, k, json } => {
            search::run_search(&cfg, &text, k, json).await?;
        }
        Commands::Docs { file, limit } => {
            docs::run_docs(&cfg, file.as_deref(), limit)?;
        }
    }

    Ok(())
}
