//! Gemini adapter
//!
//! Translates canonical messages to the Gemini `streamGenerateContent` format:
//! a `contents` array of `{role, parts}` where the assistant role is called
//! `model`, and a separate `systemInstruction`.

use reqwest::header::HeaderMap;
use reqwest::Url;
use serde_json::{json, Map, Value};

use super::{extract_system_prompt, json_headers, parse_payload, text_at, ProviderAdapter};
use crate::error::RelayResult;
use crate::native::types::{Message, Role};

/// Gemini `generateContent` adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiAdapter;

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::User | Role::System => "user",
    }
}

impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn build_headers(&self, api_key: &str) -> RelayResult<HeaderMap> {
        json_headers("x-goog-api-key", api_key.trim())
    }

    fn transform_request(&self, messages: &[Message], _model: &str, system_prompt: &str) -> Value {
        let (system, conversation) = extract_system_prompt(messages, system_prompt);

        let contents = conversation
            .iter()
            .map(|m| {
                json!({
                    "role": gemini_role(m.role),
                    "parts": [{"text": m.content}],
                })
            })
            .collect();

        let mut body = Map::new();
        body.insert("contents".into(), Value::Array(contents));
        if let Some(system) = system {
            body.insert(
                "systemInstruction".into(),
                json!({"parts": [{"text": system}]}),
            );
        }
        Value::Object(body)
    }

    fn parse_stream_chunk(&self, chunk: &Value) -> Option<String> {
        text_at(chunk, "/candidates/0/content/parts/0/text")
    }

    fn is_stream_end(&self, payload: &str) -> bool {
        parse_payload(payload)
            .map(|chunk| {
                chunk
                    .pointer("/candidates/0/finishReason")
                    .and_then(Value::as_str)
                    == Some("STOP")
                    && self.parse_stream_chunk(&chunk).is_none()
            })
            .unwrap_or(false)
    }

    /// Adds the API key and SSE framing as query parameters
    fn request_url(&self, endpoint: &Url, api_key: &str) -> Url {
        let existing: Vec<String> = endpoint
            .query_pairs()
            .map(|(name, _)| name.into_owned())
            .collect();

        let mut url = endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            if !existing.iter().any(|name| name == "alt") {
                query.append_pair("alt", "sse");
            }
            if !existing.iter().any(|name| name == "key") {
                query.append_pair("key", api_key.trim());
            }
        }
        url
    }
}
