//! Grounded answer generation.
//!
//! Builds a single instruction-formatted prompt from the retrieved
//! documents, a bounded window of chat history and the question, calls the
//! [`Generator`], and keeps only the text after the last [`INST_CLOSE`]
//! marker. Generation failures are returned as answer text, never as
//! errors.

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::models::{ChatTurn, Document};

/// Marker closing the instruction block; the answer follows the last one.
pub const INST_CLOSE: &str = "[/INST]";

/// History turns included in the prompt by default (three exchanges).
pub const DEFAULT_HISTORY_TURNS: usize = 6;

/// Fixed instruction constraining the model to the supplied context.
pub const SYSTEM_PROMPT: &str = "You are a helpful financial data assistant. Answer questions ONLY based on the provided data context.
Rules:
1. Only use information from the CONTEXT below
2. If the answer is not in the context, say \"I don't know based on the data\"
3. Never invent or guess numbers
4. Be concise and specific
5. Reference specific rows when possible";

/// Sampling knobs passed to every generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature; low values favour determinism.
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.3,
        }
    }
}

/// Text → text capability.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier.
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`. May fail.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Assemble the grounding prompt.
///
/// Documents appear in retrieval order. Only the trailing `history_turns`
/// turns of `history` are rendered, as `ROLE: content` lines; the history
/// section is left out entirely when there is none.
pub fn build_prompt(
    question: &str,
    documents: &[&Document],
    history: &[ChatTurn],
    history_turns: usize,
) -> String {
    let context = documents
        .iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let window = &history[history.len().saturating_sub(history_turns)..];

    let mut prompt = String::with_capacity(SYSTEM_PROMPT.len() + context.len() + 256);
    prompt.push_str("<s>[INST] <<SYS>>\n");
    prompt.push_str(SYSTEM_PROMPT);
    prompt.push_str("\n<</SYS>>\n\nCONTEXT:\n");
    prompt.push_str(&context);
    prompt.push_str("\n\n");

    if !window.is_empty() {
        prompt.push_str("CHAT HISTORY:\n");
        for turn in window {
            prompt.push_str(turn.role.label());
            prompt.push_str(": ");
            prompt.push_str(&turn.content);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str("USER QUESTION: ");
    prompt.push_str(question);
    prompt.push('\n');
    prompt.push_str(INST_CLOSE);
    prompt
}

/// Text after the last [`INST_CLOSE`], trimmed. Output without the marker
/// (e.g. chat APIs that return only the completion) is trimmed as is.
pub fn extract_answer(raw: &str) -> String {
    match raw.rfind(INST_CLOSE) {
        Some(pos) => raw[pos + INST_CLOSE.len()..].trim().to_string(),
        None => raw.trim().to_string(),
    }
}

/// Build the prompt, call the generator and extract the answer.
///
/// A failed call becomes `"Error generating response: <cause>"`.
pub async fn generate_answer(
    generator: &dyn Generator,
    params: &GenerationParams,
    question: &str,
    documents: &[&Document],
    history: &[ChatTurn],
    history_turns: usize,
) -> String {
    let prompt = build_prompt(question, documents, history, history_turns);
    match generator.generate(&prompt, params).await {
        Ok(raw) => extract_answer(&raw),
        Err(e) => {
            warn!(model = generator.model_name(), error = %e, "generation failed");
            format!("Error generating response: {}", e)
        }
    }
}
