//! Azure OpenAI adapter
//!
//! Same wire format as OpenAI chat completions, authenticated with an
//! `api-key` header. The model is implied by the deployment in the URL, so it
//! is only sent when configured.

use reqwest::header::HeaderMap;
use serde_json::{json, Map, Value};

use super::openai::{chat_delta, chat_messages, chat_stream_end};
use super::{json_headers, ProviderAdapter};
use crate::error::RelayResult;
use crate::native::types::Message;

/// API version used when building deployment URLs
pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// Azure OpenAI adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct AzureAdapter;

impl ProviderAdapter for AzureAdapter {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn build_headers(&self, api_key: &str) -> RelayResult<HeaderMap> {
        json_headers("api-key", api_key.trim())
    }

    fn transform_request(&self, messages: &[Message], model: &str, system_prompt: &str) -> Value {
        let mut body = Map::new();
        body.insert(
            "messages".into(),
            Value::Array(chat_messages(messages, system_prompt)),
        );
        body.insert("stream".into(), json!(true));
        if !model.trim().is_empty() {
            body.insert("model".into(), json!(model.trim()));
        }
        Value::Object(body)
    }

    fn parse_stream_chunk(&self, chunk: &Value) -> Option<String> {
        chat_delta(chunk)
    }

    fn is_stream_end(&self, payload: &str) -> bool {
        chat_stream_end(payload)
    }
}

/// Reduce whatever the user pasted as an Azure resource to the bare name
///
/// Accepts `myres`, `https://myres.openai.azure.com/...` and similar.
pub fn normalize_resource_name(resource: &str) -> String {
    let raw = resource.trim();
    let lower = raw.to_ascii_lowercase();

    let without_scheme = if lower.starts_with("https://") {
        &raw["https://".len()..]
    } else if lower.starts_with("http://") {
        &raw["http://".len()..]
    } else {
        raw
    };

    let host = without_scheme.split('/').next().unwrap_or_default();
    let name = match host.to_ascii_lowercase().find(".openai.azure.com") {
        Some(pos) => &host[..pos],
        None => host,
    };

    name.trim().to_string()
}

/// Build the chat completions URL for a deployment
///
/// Returns `None` when the resource or deployment is missing, in which case
/// the configured endpoint is used as-is.
pub fn deployment_url(resource: &str, deployment: &str, api_version: &str) -> Option<String> {
    let resource = normalize_resource_name(resource);
    let deployment = deployment.trim();
    if resource.is_empty() || deployment.is_empty() {
        return None;
    }

    let api_version = match api_version.trim() {
        "" => DEFAULT_API_VERSION,
        v => v,
    };

    let mut url = reqwest::Url::parse(&format!("https://{}.openai.azure.com/", resource)).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(["openai", "deployments", deployment, "chat", "completions"]);
    url.query_pairs_mut().append_pair("api-version", api_version);

    Some(url.to_string())
}
