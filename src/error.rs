//! Error types for Brief
//!
//! This module defines the error taxonomy shared by the orchestrator, the
//! provider adapters and the HTTP transport.

use thiserror::Error;

/// Maximum number of characters of an upstream error body kept in `Http` errors
pub const ERROR_BODY_LIMIT: usize = 200;

/// Relay-level errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("API URL or API Key not set")]
    MissingCredentials,

    #[error("API URL must use HTTPS: {0}")]
    InsecureEndpoint(String),

    #[error("Invalid API URL format: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid value for header {0}")]
    InvalidHeader(&'static str),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Stream stalled before any content arrived")]
    Stalled,

    #[error("Invalid text content")]
    EmptyInput,

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("HTTP client error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse error category, used for metrics labels and user messaging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Http,
    Timeout,
    Stall,
    Input,
    Network,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Http => "http",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Stall => "stall",
            ErrorKind::Input => "input",
            ErrorKind::Network => "network",
        }
    }
}

impl RelayError {
    /// Build an HTTP error, keeping only the head of the response body
    pub fn http(status: u16, body: &str) -> Self {
        RelayError::Http {
            status,
            body: body.chars().take(ERROR_BODY_LIMIT).collect(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::MissingCredentials
            | RelayError::InsecureEndpoint(_)
            | RelayError::InvalidEndpoint(_)
            | RelayError::InvalidHeader(_) => ErrorKind::Config,
            RelayError::Http { .. } => ErrorKind::Http,
            RelayError::Timeout => ErrorKind::Timeout,
            RelayError::Stalled => ErrorKind::Stall,
            RelayError::EmptyInput => ErrorKind::Input,
            RelayError::Stream(_) | RelayError::Network(_) | RelayError::Json(_) => {
                ErrorKind::Network
            }
        }
    }

    /// Message shown to the user on the destination surface
    pub fn user_message(&self) -> String {
        match self {
            RelayError::MissingCredentials => {
                "API URL or API Key not set. Please configure the provider settings.".to_string()
            }
            RelayError::InsecureEndpoint(_) => {
                "API URL must use HTTPS. Please reconfigure the provider settings.".to_string()
            }
            RelayError::InvalidEndpoint(_) => {
                "Invalid API URL format. Please check your configuration.".to_string()
            }
            RelayError::InvalidHeader(name) => {
                format!("API key cannot be sent in the {} header. Please check your configuration.", name)
            }
            RelayError::Http { .. } => format!("API error: {}", self),
            RelayError::Timeout => "Request timed out. Please try again.".to_string(),
            RelayError::Stalled => "Stream interrupted: the API stopped responding before sending any content. Please try again.".to_string(),
            RelayError::EmptyInput => "Invalid text content".to_string(),
            RelayError::Stream(_) => self.to_string(),
            RelayError::Network(_) => "Network error. Please check your connection.".to_string(),
            RelayError::Json(_) => "API request failed".to_string(),
        }
    }
}

/// Result type alias for convenience
pub type RelayResult<T> = Result<T, RelayError>;
