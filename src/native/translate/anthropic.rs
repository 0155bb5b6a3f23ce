//! Anthropic adapter
//!
//! Translates canonical messages to Anthropic's Messages API format.
//! Anthropic has no system role inside `messages`: the system prompt goes to a
//! separate top-level `system` field, and any System-role messages are folded
//! into it so their content is not lost.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Map, Value};

use super::{extract_system_prompt, json_headers, parse_payload, text_at, ProviderAdapter};
use crate::error::RelayResult;
use crate::native::types::Message;

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";

/// Value sent in the `anthropic-version` header
pub const API_VERSION: &str = "2023-06-01";

/// Upper bound on generated tokens (required by the API)
pub const MAX_TOKENS: u32 = 4096;

/// Anthropic Messages API adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicAdapter;

impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn build_headers(&self, api_key: &str) -> RelayResult<HeaderMap> {
        let mut headers = json_headers("x-api-key", api_key.trim())?;
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static(API_VERSION),
        );
        Ok(headers)
    }

    fn transform_request(&self, messages: &[Message], model: &str, system_prompt: &str) -> Value {
        let (system, conversation) = extract_system_prompt(messages, system_prompt);

        let model = match model.trim() {
            "" => DEFAULT_MODEL,
            m => m,
        };

        let mut body = Map::new();
        body.insert("model".into(), json!(model));
        if let Some(system) = system {
            body.insert("system".into(), json!(system));
        }
        body.insert(
            "messages".into(),
            Value::Array(
                conversation
                    .iter()
                    .map(|m| json!({"role": m.role, "content": m.content}))
                    .collect(),
            ),
        );
        body.insert("max_tokens".into(), json!(MAX_TOKENS));
        body.insert("stream".into(), json!(true));

        Value::Object(body)
    }

    fn parse_stream_chunk(&self, chunk: &Value) -> Option<String> {
        if chunk.get("type").and_then(Value::as_str) != Some("content_block_delta") {
            return None;
        }
        text_at(chunk, "/delta/text")
    }

    fn is_stream_end(&self, payload: &str) -> bool {
        let Some(event) = parse_payload(payload) else {
            return false;
        };

        let has_stop_reason = |pointer: &str| {
            event
                .pointer(pointer)
                .map(|reason| !reason.is_null())
                .unwrap_or(false)
        };

        event.get("type").and_then(Value::as_str) == Some("message_stop")
            || has_stop_reason("/stop_reason")
            || has_stop_reason("/delta/stop_reason")
    }
}
