//! SSE (Server-Sent Events) streaming utilities
//!
//! Provides the line buffer used to reassemble provider responses that arrive
//! as arbitrary byte chunks.

use std::borrow::Cow;

/// Prefix of an SSE data line
pub const DATA_PREFIX: &str = "data: ";

/// Buffer for accumulating incomplete SSE lines across chunk boundaries.
///
/// SSE data arrives as byte chunks that may not align with line boundaries,
/// and a multi-byte UTF-8 character may itself be split across two chunks.
/// Bytes are held until a complete line (ending with `\n`) is available, and
/// only complete lines are decoded.
///
/// # Example
/// ```
/// use brief::streaming::SseLineBuffer;
///
/// let mut buffer = SseLineBuffer::new();
///
/// // First chunk contains partial line
/// let lines1 = buffer.feed(b"data: {\"content\":\"hel");
/// assert!(lines1.is_empty()); // No complete lines yet
///
/// // Second chunk completes the line
/// let lines2 = buffer.feed(b"lo\"}\n");
/// assert_eq!(lines2, vec!["data: {\"content\":\"hello\"}"]);
/// ```
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    /// Bytes of the trailing, not yet terminated line
    incomplete: Vec<u8>,
}

impl SseLineBuffer {
    /// Create a new empty buffer
    pub fn new() -> Self {
        Self {
            incomplete: Vec::new(),
        }
    }

    /// Feed bytes into the buffer and return any complete lines.
    ///
    /// Complete lines are those ending with `\n`. The newline character
    /// is stripped from returned lines and empty lines are skipped.
    /// Incomplete trailing data is retained for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.incomplete.extend_from_slice(bytes);

        let Some(last_newline) = self.incomplete.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.incomplete.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.incomplete, rest);

        complete
            .split(|&b| b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Check if there's any incomplete data remaining in the buffer.
    pub fn has_incomplete(&self) -> bool {
        !self.incomplete.is_empty()
    }

    /// Get any remaining incomplete data.
    pub fn remaining(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.incomplete)
    }

    /// Drain the unterminated trailing line, if any.
    ///
    /// Call this at end of stream so a final line without a newline is still
    /// processed.
    pub fn take_remaining(&mut self) -> Option<String> {
        if self.incomplete.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.incomplete);
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Extract the payload of an SSE `data:` line
///
/// Surrounding whitespace (including a trailing `\r`) is ignored. Returns
/// `None` for comments, `event:` lines and anything else.
pub fn data_payload(line: &str) -> Option<&str> {
    line.trim().strip_prefix(DATA_PREFIX).map(str::trim)
}
