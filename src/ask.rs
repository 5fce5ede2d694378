//! One-shot questions from the command line.
//!
//! Runs the same pipeline as `POST /chat`, without a session.

use anyhow::Result;

use crate::app::build_pipeline;
use crate::config::Config;

pub async fn run_ask(config: &Config, question: &str, top_k: Option<i64>, json: bool) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("question must not be empty");
    }

    let pipeline = build_pipeline(config).await?;
    let top_k = top_k.unwrap_or(config.retrieval.default_top_k);
    let answer = pipeline.query(question, top_k, &[]).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  {} row {}", source.file, source.row_index);
        }
    }

    Ok(())
}
