//! HTTP round-trip tests for the chat API.
//!
//! Each test builds a pipeline over temp CSVs with the hash embedder and a
//! stub generator, serves it on a free port and calls it with `reqwest`.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use portfolio_rag::config::{load_config, Config};
use portfolio_rag::dataset::load_datasets;
use portfolio_rag::embedding::HashEmbedder;
use portfolio_rag::server::run_server_with_pipeline;
use portfolio_rag_core::generate::{GenerationParams, Generator};
use portfolio_rag_core::pipeline::Pipeline;

// ─── Stub generators ────────────────────────────────────────────────

/// Records prompts and answers with a fixed completion after the prompt.
#[derive(Default)]
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
    stall_on: Option<&'static str>,
}

impl RecordingGenerator {
    /// Sleeps past a one-second request timeout on prompts containing `marker`.
    fn stalling_on(marker: &'static str) -> Self {
        Self {
            stall_on: Some(marker),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }
    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        let n = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len()
        };
        if self.stall_on.map_or(false, |m| prompt.contains(m)) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        Ok(format!("{} Answer number {}.", prompt, n))
    }
}

/// Takes longer than a one-second request timeout and records whether it
/// ever ran to completion.
#[derive(Default)]
struct SlowGenerator {
    finished: AtomicBool,
}

#[async_trait]
impl Generator for SlowGenerator {
    fn model_name(&self) -> &str {
        "slow"
    }
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(2)).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok("too late".to_string())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

fn test_config(tmp: &TempDir, port: u16, request_timeout_secs: u64) -> Config {
    let root = tmp.path();
    fs::write(
        root.join("holdings.csv"),
        "symbol,quantity,value\nAAPL,10,1500\nMSFT,5,1600\nTSLA,2,400\n",
    )
    .unwrap();
    fs::write(
        root.join("trades.csv"),
        "date,symbol,quantity,price,pnl\n2024-01-02,AAPL,10,150,0\n2024-01-05,AAPL,-4,170,80\n",
    )
    .unwrap();

    let config_path = root.join("prag.toml");
    fs::write(
        &config_path,
        format!(
            r#"[data]
holdings = "{root}/holdings.csv"
trades = "{root}/trades.csv"

[server]
bind = "127.0.0.1:{port}"
request_timeout_secs = {timeout}
"#,
            root = root.display(),
            port = port,
            timeout = request_timeout_secs,
        ),
    )
    .unwrap();

    load_config(&config_path).unwrap()
}

async fn start_server(
    tmp: &TempDir,
    generator: Arc<dyn Generator>,
    request_timeout_secs: u64,
) -> (u16, tokio::task::JoinHandle<()>) {
    let port = find_free_port();
    let cfg = test_config(tmp, port, request_timeout_secs);

    let datasets = load_datasets(&cfg.data).unwrap();
    let pipeline = Pipeline::build(
        datasets,
        Arc::new(HashEmbedder::new(64)),
        generator,
        cfg.pipeline_settings(),
    )
    .await
    .unwrap();

    let handle = tokio::spawn(async move {
        let _ = run_server_with_pipeline(&cfg, Arc::new(pipeline)).await;
    });
    wait_for_server(port).await;
    (port, handle)
}

async fn post_chat(port: u16, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/chat", port))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_and_root() {
    let tmp = TempDir::new().unwrap();
    let (port, handle) = start_server(&tmp, Arc::new(RecordingGenerator::default()), 30).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["documents"], 5);
    assert!(health["version"].is_string());

    let root: Value = client
        .get(format!("http://127.0.0.1:{}/", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let endpoints = root["endpoints"].as_array().unwrap();
    assert!(endpoints.iter().any(|e| e == "POST /chat"));

    handle.abort();
}

#[tokio::test]
async fn test_chat_aggregation() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(RecordingGenerator::default());
    let (port, handle) = start_server(&tmp, generator.clone(), 30).await;

    let (status, body) = post_chat(port, json!({"message": "What is my net position in AAPL?"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["answer"], "Net position in AAPL: 6 shares");
    assert_eq!(
        body["sources"],
        json!([
            {"file": "trades.csv", "row_index": 0},
            {"file": "trades.csv", "row_index": 1}
        ])
    );
    assert!(uuid::Uuid::parse_str(body["session_id"].as_str().unwrap()).is_ok());
    assert!(generator.prompts.lock().unwrap().is_empty());

    handle.abort();
}

#[tokio::test]
async fn test_chat_session_history_reaches_prompt() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(RecordingGenerator::default());
    let (port, handle) = start_server(&tmp, generator.clone(), 30).await;

    let (status, first) = post_chat(
        port,
        json!({"session_id": "s-1", "message": "Tell me about MSFT", "top_k": 2}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(first["session_id"], "s-1");
    assert_eq!(first["answer"], "Answer number 1.");
    assert_eq!(first["sources"].as_array().unwrap().len(), 2);

    let (status, second) = post_chat(
        port,
        json!({"session_id": "s-1", "message": "And TSLA?"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(second["answer"], "Answer number 2.");
    assert_eq!(second["sources"].as_array().unwrap().len(), 5);

    let prompts = generator.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].contains("CHAT HISTORY"));
    assert!(prompts[1].contains(
        "CHAT HISTORY:\nUSER: Tell me about MSFT\nASSISTANT: Answer number 1.\n"
    ));
    assert!(prompts[1].contains("USER QUESTION: And TSLA?"));

    // A different session starts empty.
    post_chat(port, json!({"session_id": "s-2", "message": "Tell me about AAPL"})).await;
    let prompts = generator.prompts.lock().unwrap().clone();
    assert!(!prompts[2].contains("CHAT HISTORY"));

    handle.abort();
}

#[tokio::test]
async fn test_chat_validation() {
    let tmp = TempDir::new().unwrap();
    let (port, handle) = start_server(&tmp, Arc::new(RecordingGenerator::default()), 30).await;

    let (status, body) = post_chat(port, json!({"message": ""})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = post_chat(port, json!({"message": "x".repeat(2001)})).await;
    assert_eq!(status, 400);

    let (status, _) = post_chat(port, json!({"message": "x".repeat(2000)})).await;
    assert_eq!(status, 200);

    let (status, body) = post_chat(port, json!({"message": "hi", "top_k": 0})).await;
    assert_eq!(status, 400);
    assert!(body["error"]["message"].as_str().unwrap().contains("top_k"));

    let (status, _) = post_chat(port, json!({"message": "hi", "top_k": 21})).await;
    assert_eq!(status, 400);

    let (status, body) = post_chat(port, json!({"top_k": 3})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    handle.abort();
}

#[tokio::test]
async fn test_chat_timeout() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(SlowGenerator::default());
    let (port, handle) = start_server(&tmp, generator.clone(), 1).await;

    let (status, body) = post_chat(port, json!({"message": "Tell me about AAPL"})).await;
    assert_eq!(status, 408);
    assert_eq!(body["error"]["code"], "timeout");

    // The timed-out query is cancelled rather than left running.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!generator.finished.load(Ordering::SeqCst));

    // Aggregations never reach the generator.
    let (status, body) = post_chat(port, json!({"message": "How many trades?"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["answer"], "Total number of trades: 2");

    handle.abort();
}

#[tokio::test]
async fn test_chat_timeout_drops_unanswered_question() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(RecordingGenerator::stalling_on("USER QUESTION: hold on"));
    let (port, handle) = start_server(&tmp, generator.clone(), 1).await;

    let (status, _) = post_chat(port, json!({"session_id": "s-t", "message": "hold on"})).await;
    assert_eq!(status, 408);

    let (status, body) = post_chat(port, json!({"session_id": "s-t", "message": "And TSLA?"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["answer"], "Answer number 2.");

    let prompts = generator.prompts.lock().unwrap().clone();
    assert!(!prompts[1].contains("CHAT HISTORY"));

    handle.abort();
}
