//! Brief - streaming LLM relay for summaries and follow-up chat
//!
//! This library sends extracted text to a language-model API and streams the
//! answer back to a caller-supplied event sink. It speaks the OpenAI,
//! Anthropic, Azure OpenAI and Gemini wire formats, runs many requests
//! concurrently keyed by an opaque id, and supports mid-flight cancellation
//! and stall detection.

pub mod config;
pub mod error;
pub mod native;
pub mod observability;
pub mod orchestrator;
pub mod sink;
pub mod streaming;
pub mod text;
pub mod transport;

pub use crate::config::{Config, ProviderConfig};
pub use crate::error::{ErrorKind, RelayError, RelayResult};
pub use crate::native::{Conversation, Input, Message, ProviderKind, Role};
pub use crate::orchestrator::{Orchestrator, Outcome, StreamPhase, SubmitRequest};
pub use crate::sink::{ChannelSink, EventSink, Placeholder, UiEvent};
pub use crate::transport::{HttpTransport, Transport, WireRequest};
