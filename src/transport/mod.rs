//! HTTP transport seam
//!
//! The orchestrator only needs "POST this JSON and give me the body as a byte
//! stream". Keeping that behind a trait lets tests drive the state machine
//! with scripted chunk sequences instead of a live server.

#[cfg(any(test, feature = "test-utils"))]
pub mod scripted;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::HeaderMap;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::error::{RelayError, RelayResult};

/// Response body as it arrives from the network
pub type ByteStream = Pin<Box<dyn Stream<Item = RelayResult<Bytes>> + Send>>;

/// One fully built provider request
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Performs the streamed POST for a request
///
/// # Errors
///
/// Implementations return `RelayError::Http` for a non-2xx status, with the
/// head of the response body, and `RelayError::Network` when the request
/// could not be sent at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_stream(&self, request: WireRequest) -> RelayResult<ByteStream>;
}

/// `Transport` backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(host = ?request.url.host_str()))]
    async fn post_stream(&self, request: WireRequest) -> RelayResult<ByteStream> {
        let response = self
            .client
            .post(request.url)
            .headers(request.headers)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| {
                // Gemini carries the key in the query string
                let e = e.without_url();
                error!(error = %e, "Failed to send request to provider");
                RelayError::Network(e)
            })?;

        let status = response.status();
        debug!(status = %status, "Received response from provider");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::http(status.as_u16(), &body));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| RelayError::Stream(e.without_url().to_string())));
        Ok(Box::pin(stream))
    }
}
