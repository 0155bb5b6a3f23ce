//! Translation layer for converting canonical messages to provider wire formats
//!
//! This module provides the `ProviderAdapter` trait and one implementation per
//! backend family. An adapter knows how to authenticate, how to shape the
//! request body, how to pull a text delta out of one decoded stream chunk, and
//! how to recognise the provider's end-of-stream marker.

pub mod anthropic;
pub mod azure;
pub mod gemini;
pub mod openai;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use serde_json::Value;

use super::types::{Message, ProviderKind, Role};
use crate::error::{RelayError, RelayResult};

/// Strategy for one provider wire protocol
///
/// Implementations are stateless; `parse_stream_chunk` and `is_stream_end`
/// must be pure so the same input always yields the same answer.
pub trait ProviderAdapter: Send + Sync {
    /// Provider name for logging and metrics
    fn name(&self) -> &'static str;

    /// Build the request headers, including authentication
    ///
    /// # Errors
    ///
    /// Returns `RelayError::InvalidHeader` if the API key contains characters
    /// that cannot appear in an HTTP header.
    fn build_headers(&self, api_key: &str) -> RelayResult<HeaderMap>;

    /// Translate canonical messages into the provider's JSON request body
    ///
    /// Never drops a message. Providers without a system role in their
    /// message array fold System-role content into their system field.
    fn transform_request(&self, messages: &[Message], model: &str, system_prompt: &str) -> Value;

    /// Extract the text delta from one decoded stream chunk
    ///
    /// Returns `None` for chunks that carry no text, including well-formed
    /// JSON of an unexpected shape.
    fn parse_stream_chunk(&self, chunk: &Value) -> Option<String>;

    /// Check whether an SSE payload is a pure end-of-stream marker
    ///
    /// Takes the raw text following `data: `. A chunk that carries both text
    /// and an end marker is not an end marker, so its text is still parsed.
    fn is_stream_end(&self, payload: &str) -> bool;

    /// URL to POST to at call time
    fn request_url(&self, endpoint: &Url, _api_key: &str) -> Url {
        endpoint.clone()
    }
}

static OPENAI: openai::OpenAiAdapter = openai::OpenAiAdapter;
static ANTHROPIC: anthropic::AnthropicAdapter = anthropic::AnthropicAdapter;
static AZURE: azure::AzureAdapter = azure::AzureAdapter;
static GEMINI: gemini::GeminiAdapter = gemini::GeminiAdapter;

/// Select the adapter for a provider family
pub fn adapter_for(kind: ProviderKind) -> &'static dyn ProviderAdapter {
    match kind {
        ProviderKind::OpenAi => &OPENAI,
        ProviderKind::Anthropic => &ANTHROPIC,
        ProviderKind::Azure => &AZURE,
        ProviderKind::Gemini => &GEMINI,
    }
}

/// Headers common to every provider: JSON body plus one credential header
pub(crate) fn json_headers(
    auth_header: &'static str,
    auth_value: &str,
) -> RelayResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let mut value =
        HeaderValue::from_str(auth_value).map_err(|_| RelayError::InvalidHeader(auth_header))?;
    value.set_sensitive(true);
    headers.insert(HeaderName::from_static(auth_header), value);

    Ok(headers)
}

/// Non-empty string at a JSON pointer
pub(crate) fn text_at(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse an SSE payload as JSON, treating anything else as "not JSON"
pub(crate) fn parse_payload(payload: &str) -> Option<Value> {
    serde_json::from_str(payload.trim()).ok()
}

/// Extract system prompt from messages
///
/// Combines the configured system prompt with the content of any System-role
/// messages, in order, and returns the remaining non-system messages.
pub(crate) fn extract_system_prompt<'a>(
    messages: &'a [Message],
    system_prompt: &str,
) -> (Option<String>, Vec<&'a Message>) {
    let mut system_texts = Vec::new();
    let mut non_system_messages = Vec::new();

    if !system_prompt.trim().is_empty() {
        system_texts.push(system_prompt);
    }

    for message in messages {
        match message.role {
            Role::System => system_texts.push(message.content.as_str()),
            _ => non_system_messages.push(message),
        }
    }

    let system = if system_texts.is_empty() {
        None
    } else {
        Some(system_texts.join("\n\n"))
    };

    (system, non_system_messages)
}
