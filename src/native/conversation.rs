//! Caller-side conversation history
//!
//! The orchestrator is stateless between requests. A UI surface that wants
//! follow-up turns keeps a `Conversation` and feeds it the `stream_end`
//! events it receives.

use super::types::{Input, Message, Role};

/// Ordered history of one chat thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished response
    ///
    /// For an initial request `original_context` starts a fresh history with
    /// the submitted content as the first user turn.
    pub fn record_response(&mut self, full_response: &str, original_context: Option<&str>) {
        if let Some(context) = original_context {
            self.messages.clear();
            self.messages.push(Message::user(context));
        }
        self.messages.push(Message::assistant(full_response));
    }

    /// Append a user turn and return the input for the follow-up request
    pub fn follow_up(&mut self, question: impl Into<String>) -> Input {
        self.messages.push(Message::user(question));
        Input::FollowUp(self.messages.clone())
    }

    /// Drop a trailing user turn that never got an answer
    pub fn discard_pending(&mut self) -> Option<Message> {
        match self.messages.last() {
            Some(m) if m.role == Role::User && self.messages.len() > 1 => self.messages.pop(),
            _ => None,
        }
    }

    /// Whether an initial response has been recorded
    pub fn is_started(&self) -> bool {
        !self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
