//! Configuration management for Brief
//!
//! Configuration is loaded from environment variables. Each request takes a
//! `ProviderConfig` snapshot of it, so changing settings never affects a
//! request that is already in flight.

use std::env;
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use tracing::warn;

use crate::error::{RelayError, RelayResult};
use crate::native::translate::azure;
use crate::native::types::ProviderKind;

/// System prompt used when none is configured
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that summarizes content concisely.";

/// Instructions appended to the system prompt when timestamps are enabled
pub const DEFAULT_TIMESTAMP_PROMPT: &str = "Timestamps:
If and ONLY if timestamps are provided;
- Include timestamp that correlate with the summarized bullet.
- Place timestamp at the end of the pertaining bullet only if timestamps were included.
- Use timestamps in the follow format: hh:mm:ss (e.g., '00:45', '03:12') and do not guess, or fabricate timestamps.
- Omit the 'HH:' portion for content under 1 hour.";

/// Gemini model used to derive an endpoint when none is configured
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

const DEFAULT_MAX_TEXT_LENGTH: usize = 100_000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Backend wire-protocol family
    pub provider: ProviderKind,
    /// Endpoint to POST to; derived for Azure and Gemini when left empty
    pub api_url: String,
    pub api_key: String,
    /// Model name; adapters fall back to their own default when empty
    pub model: String,
    pub system_prompt: String,
    pub timestamp_prompt: String,
    pub include_timestamps: bool,

    /// Initial content longer than this many characters is truncated
    pub max_text_length: usize,
    /// Time allowed for response headers to arrive
    pub request_timeout: Duration,
    /// Longest silence tolerated between two body chunks
    pub chunk_timeout: Duration,

    /// Describe requests instead of sending them
    pub debug_mode: bool,

    pub azure_resource: String,
    pub azure_deployment: String,
    pub azure_api_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            api_url: String::new(),
            api_key: String::new(),
            model: String::new(),
            system_prompt: String::new(),
            timestamp_prompt: DEFAULT_TIMESTAMP_PROMPT.to_string(),
            include_timestamps: false,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            chunk_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            debug_mode: false,
            azure_resource: String::new(),
            azure_deployment: String::new(),
            azure_api_version: String::new(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("include_timestamps", &self.include_timestamps)
            .field("max_text_length", &self.max_text_length)
            .field("request_timeout", &self.request_timeout)
            .field("chunk_timeout", &self.chunk_timeout)
            .field("debug_mode", &self.debug_mode)
            .field("azure_resource", &self.azure_resource)
            .field("azure_deployment", &self.azure_deployment)
            .finish_non_exhaustive()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

fn flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

impl Config {
    /// Minimal configuration for one provider endpoint
    pub fn new(provider: ProviderKind, api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_url: api_url.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let provider = match env::var("BRIEF_PROVIDER") {
            Ok(name) => name.parse().unwrap_or_else(|_| {
                let detected = ProviderKind::detect(&name);
                warn!(provider = %name, detected = %detected, "Unrecognised provider name, inferring family");
                detected
            }),
            Err(_) => ProviderKind::default(),
        };

        Ok(Self {
            provider,
            api_url: env::var("BRIEF_API_URL").unwrap_or_default(),
            api_key: env::var("BRIEF_API_KEY").unwrap_or_default(),
            model: env::var("BRIEF_MODEL").unwrap_or_default(),
            system_prompt: env::var("BRIEF_SYSTEM_PROMPT").unwrap_or_default(),
            timestamp_prompt: env::var("BRIEF_TIMESTAMP_PROMPT")
                .unwrap_or_else(|_| DEFAULT_TIMESTAMP_PROMPT.to_string()),
            include_timestamps: flag("BRIEF_INCLUDE_TIMESTAMPS"),

            max_text_length: env::var("BRIEF_MAX_TEXT_LENGTH")
                .unwrap_or_else(|_| DEFAULT_MAX_TEXT_LENGTH.to_string())
                .parse()
                .context("Invalid BRIEF_MAX_TEXT_LENGTH")?,
            request_timeout: Duration::from_secs(
                env::var("BRIEF_REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
                    .parse()
                    .context("Invalid BRIEF_REQUEST_TIMEOUT_SECS")?,
            ),
            chunk_timeout: Duration::from_secs(
                env::var("BRIEF_CHUNK_TIMEOUT_SECS")
                    .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
                    .parse()
                    .context("Invalid BRIEF_CHUNK_TIMEOUT_SECS")?,
            ),

            debug_mode: flag("BRIEF_DEBUG_MODE"),

            azure_resource: env::var("BRIEF_AZURE_RESOURCE").unwrap_or_default(),
            azure_deployment: env::var("BRIEF_AZURE_DEPLOYMENT").unwrap_or_default(),
            azure_api_version: env::var("BRIEF_AZURE_API_VERSION").unwrap_or_default(),
        })
    }

    /// Endpoint the request is sent to
    ///
    /// An explicit URL always wins. Otherwise Azure derives one from the
    /// resource and deployment, and Gemini from the model name.
    pub fn endpoint(&self) -> String {
        let explicit = self.api_url.trim();
        if !explicit.is_empty() {
            return explicit.to_string();
        }

        match self.provider {
            ProviderKind::Azure => azure::deployment_url(
                &self.azure_resource,
                &self.azure_deployment,
                &self.azure_api_version,
            )
            .unwrap_or_default(),
            ProviderKind::Gemini => {
                let model = match self.model.trim() {
                    "" => DEFAULT_GEMINI_MODEL,
                    m => m,
                };
                format!(
                    "https://generativelanguage.googleapis.com/v1beta/models/{}:streamGenerateContent",
                    model
                )
            }
            ProviderKind::OpenAi | ProviderKind::Anthropic => String::new(),
        }
    }

    /// Configured system prompt (or the default) plus the timestamp prompt
    pub fn effective_system_prompt(&self) -> String {
        let mut prompt = match self.system_prompt.trim() {
            "" => DEFAULT_SYSTEM_PROMPT.to_string(),
            p => p.to_string(),
        };
        let timestamps = self.timestamp_prompt.trim();
        if self.include_timestamps && !timestamps.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(timestamps);
        }
        prompt
    }

    /// Snapshot used for one request
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            kind: self.provider,
            endpoint: self.endpoint(),
            api_key: self.api_key.trim().to_string(),
            model: self.model.trim().to_string(),
            system_prompt: self.effective_system_prompt(),
        }
    }
}

/// Per-request provider settings, fixed for the lifetime of the request
#[derive(Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ProviderConfig {
    /// Check credentials and parse the endpoint
    ///
    /// # Errors
    ///
    /// `MissingCredentials` when the endpoint or key is empty,
    /// `InvalidEndpoint` when the endpoint is not a URL and
    /// `InsecureEndpoint` when its scheme is not `https` (unless
    /// `allow_insecure` is set).
    pub fn validate_endpoint(&self, allow_insecure: bool) -> RelayResult<Url> {
        if self.endpoint.is_empty() || self.api_key.is_empty() {
            return Err(RelayError::MissingCredentials);
        }

        let url = Url::parse(&self.endpoint)
            .map_err(|_| RelayError::InvalidEndpoint(self.endpoint.clone()))?;

        match url.scheme() {
            "https" => Ok(url),
            "http" if allow_insecure => Ok(url),
            _ => Err(RelayError::InsecureEndpoint(self.endpoint.clone())),
        }
    }
}
