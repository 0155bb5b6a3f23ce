//! Scripted transport for tests
//!
//! Replays canned responses in submission order and records every request it
//! receives, so tests can assert on URLs, headers and bodies.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::{ByteStream, Transport, WireRequest};
use crate::error::{RelayError, RelayResult};

/// One step of a scripted response body
#[derive(Debug, Clone)]
pub enum Step {
    /// Yield these bytes as one chunk
    Chunk(Bytes),
    /// Wait before the next step
    Delay(Duration),
    /// Never yield anything again
    Hang,
    /// Fail the read with this message
    Fail(String),
}

impl Step {
    pub fn chunk(bytes: impl Into<Bytes>) -> Self {
        Step::Chunk(bytes.into())
    }

    /// An SSE `data:` line, newline included
    pub fn data(payload: &str) -> Self {
        Step::Chunk(Bytes::from(format!("data: {}\n", payload)))
    }
}

/// Canned reply to one `post_stream` call
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// 2xx with a body made of these steps
    Stream(Vec<Step>),
    /// Non-2xx status with a body
    Status(u16, String),
    /// Wait, then reply with the inner response
    Delayed(Duration, Box<ScriptedResponse>),
    /// The call never completes
    Hang,
}

/// `Transport` that replays scripted responses
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<WireRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that answers a single call
    pub fn with_response(response: ScriptedResponse) -> Self {
        let transport = Self::new();
        transport.push(response);
        transport
    }

    /// Transport that streams these steps for a single call
    pub fn streaming(steps: Vec<Step>) -> Self {
        Self::with_response(ScriptedResponse::Stream(steps))
    }

    pub fn push(&self, response: ScriptedResponse) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn body(steps: Vec<Step>) -> ByteStream {
        let stream = async_stream::stream! {
            for step in steps {
                match step {
                    Step::Chunk(bytes) => yield Ok(bytes),
                    Step::Delay(duration) => tokio::time::sleep(duration).await,
                    Step::Hang => std::future::pending::<()>().await,
                    Step::Fail(message) => {
                        yield Err(RelayError::Stream(message));
                        return;
                    }
                }
            }
        };
        Box::pin(stream)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_stream(&self, request: WireRequest) -> RelayResult<ByteStream> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let next = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        let mut response = next.ok_or_else(|| RelayError::Stream("no scripted response left".into()))?;
        loop {
            match response {
                ScriptedResponse::Stream(steps) => return Ok(Self::body(steps)),
                ScriptedResponse::Status(status, body) => return Err(RelayError::http(status, &body)),
                ScriptedResponse::Delayed(duration, inner) => {
                    tokio::time::sleep(duration).await;
                    response = *inner;
                }
                ScriptedResponse::Hang => std::future::pending::<()>().await,
            }
        }
    }
}
