//! Outbound notification boundary
//!
//! The orchestrator never renders anything itself. It reports progress for a
//! request to an `EventSink` supplied by the caller with each submission.

use tokio::sync::mpsc;

/// Which hint the caller's input box should show once it is unlocked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// Ready for a follow-up question
    FollowUp,
}

/// Receiver of UI events for one or more requests
///
/// Calls are made from the orchestrator's tasks and, for `delta`, while that
/// request's session is locked. Implementations should not block, and must
/// not cancel the same request from inside `delta`.
pub trait EventSink: Send + Sync {
    fn loading_started(&self, id: &str);

    fn loading_ended(&self, id: &str);

    /// One incremental piece of the response, in wire order
    fn delta(&self, id: &str, text: &str);

    /// Informational text that is not part of the response
    fn notice(&self, id: &str, text: &str);

    /// Terminal success, including soft completion after a stall
    ///
    /// `original_context` is the submitted content of an initial request, so
    /// the caller can seed conversation history. It is `None` for follow-ups.
    fn stream_end(&self, id: &str, full_response: &str, original_context: Option<&str>);

    fn error(&self, id: &str, message: &str);

    fn input_unlocked(&self, id: &str, placeholder: Placeholder);
}

/// An event as delivered by `ChannelSink`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    LoadingStarted {
        id: String,
    },
    LoadingEnded {
        id: String,
    },
    Delta {
        id: String,
        text: String,
    },
    Notice {
        id: String,
        text: String,
    },
    StreamEnd {
        id: String,
        full_response: String,
        original_context: Option<String>,
    },
    Error {
        id: String,
        message: String,
    },
    InputUnlocked {
        id: String,
        placeholder: Placeholder,
    },
}

impl UiEvent {
    /// Request id the event belongs to
    pub fn id(&self) -> &str {
        match self {
            UiEvent::LoadingStarted { id }
            | UiEvent::LoadingEnded { id }
            | UiEvent::Delta { id, .. }
            | UiEvent::Notice { id, .. }
            | UiEvent::StreamEnd { id, .. }
            | UiEvent::Error { id, .. }
            | UiEvent::InputUnlocked { id, .. } => id,
        }
    }
}

/// Sink that forwards every event over an unbounded tokio channel
///
/// Sending never blocks. Events for a receiver that has gone away are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: UiEvent) {
        // Receiver dropped means nobody is watching this surface anymore
        let _ = self.sender.send(event);
    }
}

impl EventSink for ChannelSink {
    fn loading_started(&self, id: &str) {
        self.send(UiEvent::LoadingStarted { id: id.to_string() });
    }

    fn loading_ended(&self, id: &str) {
        self.send(UiEvent::LoadingEnded { id: id.to_string() });
    }

    fn delta(&self, id: &str, text: &str) {
        self.send(UiEvent::Delta {
            id: id.to_string(),
            text: text.to_string(),
        });
    }

    fn notice(&self, id: &str, text: &str) {
        self.send(UiEvent::Notice {
            id: id.to_string(),
            text: text.to_string(),
        });
    }

    fn stream_end(&self, id: &str, full_response: &str, original_context: Option<&str>) {
        self.send(UiEvent::StreamEnd {
            id: id.to_string(),
            full_response: full_response.to_string(),
            original_context: original_context.map(str::to_string),
        });
    }

    fn error(&self, id: &str, message: &str) {
        self.send(UiEvent::Error {
            id: id.to_string(),
            message: message.to_string(),
        });
    }

    fn input_unlocked(&self, id: &str, placeholder: Placeholder) {
        self.send(UiEvent::InputUnlocked {
            id: id.to_string(),
            placeholder,
        });
    }
}
