//! Common test utilities for Brief
//!
//! Shared fixtures for the integration tests: SSE body builders for every
//! provider dialect, orchestrator constructors and event collection helpers.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use brief::transport::scripted::{ScriptedTransport, Step};
use brief::{ChannelSink, Config, EventSink, HttpTransport, Orchestrator, ProviderKind, UiEvent};
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::MockServer;

/// Test configuration constants
pub mod constants {
    pub const TEST_API_KEY: &str = "test-api-key";
    pub const TEST_ENDPOINT: &str = "https://api.example.com/v1/chat/completions";
    pub const OPENAI_PATH: &str = "/v1/chat/completions";
    pub const ANTHROPIC_PATH: &str = "/v1/messages";
    pub const GEMINI_PATH: &str = "/v1beta/models/gemini-pro:streamGenerateContent";
    pub const AZURE_PATH: &str = "/openai/deployments/gpt4/chat/completions";
}

/// SSE payloads in each provider's dialect
pub mod chunks {
    use super::*;

    pub fn openai(text: &str) -> String {
        json!({"choices": [{"index": 0, "delta": {"content": text}}]}).to_string()
    }

    pub fn openai_stop() -> String {
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}).to_string()
    }

    pub fn anthropic(text: &str) -> String {
        json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": text}
        })
        .to_string()
    }

    pub fn gemini(text: &str) -> String {
        json!({
            "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
        })
        .to_string()
    }
}

/// Join payloads into an SSE body, one `data:` event each
pub fn sse_body(payloads: &[String]) -> String {
    payloads
        .iter()
        .map(|p| format!("data: {}\n\n", p))
        .collect()
}

/// OpenAI-style stream: one delta per text, then `[DONE]`
pub fn openai_stream(texts: &[&str]) -> String {
    let mut payloads: Vec<String> = texts.iter().map(|t| chunks::openai(t)).collect();
    payloads.push("[DONE]".to_string());
    sse_body(&payloads)
}

/// Anthropic stream with its `event:` lines and lifecycle events
pub fn anthropic_stream(texts: &[&str]) -> String {
    let mut body = String::new();
    body.push_str("event: message_start\n");
    body.push_str(&format!(
        "data: {}\n\n",
        json!({"type": "message_start", "message": {"id": "msg_1", "stop_reason": null}})
    ));
    for text in texts {
        body.push_str("event: content_block_delta\n");
        body.push_str(&format!("data: {}\n\n", chunks::anthropic(text)));
    }
    body.push_str("event: message_delta\n");
    body.push_str(&format!(
        "data: {}\n\n",
        json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}})
    ));
    body.push_str("event: message_stop\n");
    body.push_str(&format!("data: {}\n\n", json!({"type": "message_stop"})));
    body
}

/// Scripted steps for an OpenAI-style stream
pub fn openai_steps(texts: &[&str]) -> Vec<Step> {
    let mut steps: Vec<Step> = texts.iter().map(|t| Step::data(&chunks::openai(t))).collect();
    steps.push(Step::data("[DONE]"));
    steps
}

pub fn config(kind: ProviderKind, endpoint: &str) -> Config {
    Config::new(kind, endpoint, constants::TEST_API_KEY)
}

/// Config with short timeouts so stall tests finish quickly under paused time
pub fn config_with_timeouts(kind: ProviderKind, endpoint: &str, request: u64, chunk: u64) -> Config {
    let mut config = config(kind, endpoint);
    config.request_timeout = Duration::from_secs(request);
    config.chunk_timeout = Duration::from_secs(chunk);
    config
}

/// Orchestrator over a scripted transport with an HTTPS endpoint
pub fn scripted_orchestrator(transport: Arc<ScriptedTransport>) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new(
        config(ProviderKind::OpenAi, constants::TEST_ENDPOINT),
        transport,
    ))
}

/// Orchestrator talking real HTTP to a mock server
pub fn http_orchestrator(config: Config) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new_for_testing(
        config,
        Arc::new(HttpTransport::default()),
    ))
}

pub fn mock_url(server: &MockServer, path: &str) -> String {
    format!("{}{}", server.uri(), path)
}

pub fn sink() -> (Arc<dyn EventSink>, UnboundedReceiver<UiEvent>) {
    let (sink, rx) = ChannelSink::new();
    (Arc::new(sink), rx)
}

/// Everything delivered so far
pub fn drain(rx: &mut UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Texts of all delta events, in order
pub fn deltas(events: &[UiEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            UiEvent::Delta { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

pub fn stream_ends(events: &[UiEvent]) -> Vec<&UiEvent> {
    events
        .iter()
        .filter(|e| matches!(e, UiEvent::StreamEnd { .. }))
        .collect()
}

pub fn errors(events: &[UiEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            UiEvent::Error { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}
