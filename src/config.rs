//! TOML configuration.
//!
//! Every command reads one config file (default `./config/prag.toml`).
//! Only `[data]` is required; every other section has defaults that run
//! fully offline (hash embeddings, generation disabled).
//!
//! ```toml
//! [data]
//! holdings = "dataset/holdings.csv"
//! trades = "dataset/trades.csv"
//!
//! [embedding]
//! provider = "ollama"
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [generation]
//! provider = "ollama"
//! model = "llama3.2"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use portfolio_rag_core::generate::GenerationParams;
use portfolio_rag_core::pipeline::{PipelineSettings, MAX_TOP_K};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    pub holdings: PathBuf,
    pub trades: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embed_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_embed_retries(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embed_retries() -> u32 {
    5
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_retries: default_generation_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

fn default_generation_provider() -> String {
    "disabled".to_string()
}
fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.3
}
fn default_generation_retries() -> u32 {
    3
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: i64,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: i64,
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            history_turns: default_history_turns(),
        }
    }
}

fn default_top_k() -> i64 {
    5
}
fn default_max_top_k() -> i64 {
    MAX_TOP_K
}
fn default_history_turns() -> usize {
    6
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Exchanges kept per session; history holds at most twice this many turns.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}

fn default_max_history() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_secs: default_request_timeout_secs(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_request_timeout_secs() -> u64 {
    180
}

impl Config {
    /// Pipeline tuning derived from this config.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            history_turns: self.retrieval.history_turns,
            generation: self.generation.params(),
            embed_batch_size: self.embedding.batch_size,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate embedding
    match config.embedding.provider.as_str() {
        "hash" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() {
                anyhow::bail!(
                    "embedding.dims must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hash, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Validate generation
    match config.generation.provider.as_str() {
        "disabled" => {}
        "openai" | "ollama" => {
            if config.generation.model.is_none() {
                anyhow::bail!(
                    "generation.model must be specified when provider is '{}'",
                    config.generation.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.generation.max_tokens == 0 {
        anyhow::bail!("generation.max_tokens must be > 0");
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    // Validate retrieval
    let r = &config.retrieval;
    if !(1..=MAX_TOP_K).contains(&r.max_top_k) {
        anyhow::bail!("retrieval.max_top_k must be in [1, {}]", MAX_TOP_K);
    }
    if !(1..=r.max_top_k).contains(&r.default_top_k) {
        anyhow::bail!("retrieval.default_top_k must be in [1, retrieval.max_top_k]");
    }
    if r.history_turns == 0 || r.history_turns % 2 != 0 {
        anyhow::bail!("retrieval.history_turns must be a positive even number");
    }

    if config.session.max_history == 0 {
        anyhow::bail!("session.max_history must be > 0");
    }
    if config.server.request_timeout_secs == 0 {
        anyhow::bail!("server.request_timeout_secs must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
[data]
holdings = "h.csv"
trades = "t.csv"
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = parse(MINIMAL).unwrap();
        assert_eq!(cfg.embedding.provider, "hash");
        assert!(!cfg.generation.is_enabled());
        assert_eq!(cfg.retrieval.default_top_k, 5);
        assert_eq!(cfg.retrieval.history_turns, 6);
        assert_eq!(cfg.session.max_history, 10);
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
        assert_eq!(cfg.generation.params(), GenerationParams::default());
    }

    #[test]
    fn test_missing_data_section_fails() {
        assert!(parse("[server]\nbind = \"0.0.0.0:1\"\n").is_err());
    }

    #[test]
    fn test_remote_embedding_requires_model_and_dims() {
        let err = parse(&format!("{}\n[embedding]\nprovider = \"openai\"\n", MINIMAL)).unwrap_err();
        assert!(err.to_string().contains("embedding.model"));

        let err = parse(&format!(
            "{}\n[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\n",
            MINIMAL
        ))
        .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_unknown_providers_rejected() {
        assert!(parse(&format!("{}\n[embedding]\nprovider = \"magic\"\n", MINIMAL)).is_err());
        assert!(parse(&format!("{}\n[generation]\nprovider = \"magic\"\n", MINIMAL)).is_err());
    }

    #[test]
    fn test_generation_requires_model() {
        let err = parse(&format!("{}\n[generation]\nprovider = \"ollama\"\n", MINIMAL)).unwrap_err();
        assert!(err.to_string().contains("generation.model"));
    }

    #[test]
    fn test_top_k_bounds() {
        assert!(parse(&format!("{}\n[retrieval]\nmax_top_k = 50\n", MINIMAL)).is_err());
        assert!(parse(&format!("{}\n[retrieval]\ndefault_top_k = 0\n", MINIMAL)).is_err());
        assert!(parse(&format!(
            "{}\n[retrieval]\ndefault_top_k = 8\nmax_top_k = 4\n",
            MINIMAL
        ))
        .is_err());
    }

    #[test]
    fn test_history_turns_must_be_even() {
        assert!(parse(&format!("{}\n[retrieval]\nhistory_turns = 5\n", MINIMAL)).is_err());
    }

    #[test]
    fn test_temperature_range() {
        assert!(parse(&format!("{}\n[generation]\ntemperature = 3.5\n", MINIMAL)).is_err());
    }
}
