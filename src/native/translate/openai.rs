//! OpenAI-compatible adapter
//!
//! Used for OpenAI itself and for every API that speaks the chat completions
//! dialect (Groq, OpenRouter, local gateways). The system prompt travels as a
//! leading `system` message.

use reqwest::header::HeaderMap;
use serde_json::{json, Value};

use super::{json_headers, parse_payload, text_at, ProviderAdapter};
use crate::error::RelayResult;
use crate::native::types::Message;

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Literal end-of-stream token sent as `data: [DONE]`
pub const DONE_MARKER: &str = "[DONE]";

/// OpenAI chat completions adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiAdapter;

/// Message array with the system prompt injected as the first entry
pub(crate) fn chat_messages(messages: &[Message], system_prompt: &str) -> Vec<Value> {
    let mut formatted = Vec::with_capacity(messages.len() + 1);
    if !system_prompt.is_empty() {
        formatted.push(json!({"role": "system", "content": system_prompt}));
    }
    formatted.extend(
        messages
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content})),
    );
    formatted
}

/// Delta text from a chat completions chunk
///
/// Falls back to `choices[0].message.content` for providers that answer a
/// streaming request with a single non-streaming body.
pub(crate) fn chat_delta(chunk: &Value) -> Option<String> {
    if let Some(text) = text_at(chunk, "/choices/0/delta/content") {
        return Some(text);
    }
    if chunk.pointer("/choices/0/delta").is_none() {
        return text_at(chunk, "/choices/0/message/content");
    }
    None
}

/// `[DONE]`, or a `finish_reason: "stop"` chunk without text
pub(crate) fn chat_stream_end(payload: &str) -> bool {
    if payload.trim() == DONE_MARKER {
        return true;
    }
    parse_payload(payload)
        .map(|chunk| {
            chunk.pointer("/choices/0/finish_reason").and_then(Value::as_str) == Some("stop")
                && chat_delta(&chunk).is_none()
        })
        .unwrap_or(false)
}

impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn build_headers(&self, api_key: &str) -> RelayResult<HeaderMap> {
        json_headers("authorization", &format!("Bearer {}", api_key.trim()))
    }

    fn transform_request(&self, messages: &[Message], model: &str, system_prompt: &str) -> Value {
        let model = match model.trim() {
            "" => DEFAULT_MODEL,
            m => m,
        };
        json!({
            "model": model,
            "messages": chat_messages(messages, system_prompt),
            "stream": true,
        })
    }

    fn parse_stream_chunk(&self, chunk: &Value) -> Option<String> {
        chat_delta(chunk)
    }

    fn is_stream_end(&self, payload: &str) -> bool {
        chat_stream_end(payload)
    }
}
