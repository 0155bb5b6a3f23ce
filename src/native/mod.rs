//! Native message model for Brief
//!
//! This module defines the canonical message format that every provider
//! adapter translates from, the caller-side conversation history, and the
//! registry of in-flight request sessions.

pub mod conversation;
pub mod session;
pub mod translate;
pub mod types;

// Re-export key types for convenience
pub use conversation::Conversation;
pub use session::{RequestRegistry, RequestSession, SessionHandle};
pub use translate::{adapter_for, ProviderAdapter};
pub use types::{Input, Message, ProviderKind, Role};
