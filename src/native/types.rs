//! Core message types
//!
//! Defines the provider-agnostic message model: roles, messages, the request
//! input shape and the provider family selector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of a message participant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message providing instructions or context
    System,
    /// User message from the human
    User,
    /// Assistant message from the AI
    Assistant,
}

/// A chat message with role and content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// The role of the message author
    pub role: Role,
    /// The text content of the message
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// What the caller submits for one request
///
/// A bare string is an initial request built from extracted content; a
/// message sequence is a follow-up turn that reuses prior history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Initial(String),
    FollowUp(Vec<Message>),
}

impl Input {
    pub fn is_initial(&self) -> bool {
        matches!(self, Input::Initial(_))
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Input::Initial(text)
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Input::Initial(text.to_string())
    }
}

impl From<Vec<Message>> for Input {
    fn from(messages: Vec<Message>) -> Self {
        Input::FollowUp(messages)
    }
}

/// Backend wire-protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI and OpenAI-compatible APIs (Groq, OpenRouter, ...)
    #[default]
    OpenAi,
    Anthropic,
    Azure,
    Gemini,
}

impl ProviderKind {
    /// Infer the provider family from a free-text provider name.
    ///
    /// Case-insensitive substring match; anything unrecognised is treated as
    /// OpenAI-compatible. Prefer parsing an explicit value with `FromStr`.
    pub fn detect(name: &str) -> Self {
        let name = name.to_lowercase();

        if name.contains("anthropic") || name.contains("claude") {
            ProviderKind::Anthropic
        } else if name.contains("azure") {
            ProviderKind::Azure
        } else if name.contains("gemini") || name.contains("google") {
            ProviderKind::Gemini
        } else {
            ProviderKind::OpenAi
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Azure => "azure",
            ProviderKind::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a provider name is not one of the explicit values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openai-compatible" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "azure" => Ok(ProviderKind::Azure),
            "gemini" => Ok(ProviderKind::Gemini),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}
