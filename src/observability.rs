//! Metrics and structured request logging
//!
//! Metrics go through the `metrics` facade; installing an exporter is left to
//! the embedding application. `RequestContext` carries a short correlation id
//! so every log line for one request can be grepped together.

use std::time::Instant;

use tracing::{debug, error, info, warn, Span};
use uuid::Uuid;

/// Describe all metrics emitted by the relay (call once at startup)
pub fn describe_metrics() {
    metrics::describe_counter!(
        "brief_requests_total",
        "Total number of requests by outcome and provider"
    );
    metrics::describe_histogram!(
        "brief_request_duration_seconds",
        "Time from submission to terminal outcome in seconds"
    );
    metrics::describe_counter!(
        "brief_deltas_total",
        "Total text deltas forwarded to destinations"
    );
    metrics::describe_counter!(
        "brief_chunk_parse_errors_total",
        "Stream lines skipped because their payload was not valid JSON"
    );
}

/// Record a finished request
pub fn record_request(outcome: &str, provider: &str, duration_secs: f64) {
    metrics::counter!(
        "brief_requests_total",
        "outcome" => outcome.to_string(),
        "provider" => provider.to_string()
    )
    .increment(1);
    metrics::histogram!("brief_request_duration_seconds", "provider" => provider.to_string())
        .record(duration_secs);
}

/// Record one forwarded delta
pub fn record_delta(provider: &str) {
    metrics::counter!("brief_deltas_total", "provider" => provider.to_string()).increment(1);
}

/// Record a stream line that failed to decode
pub fn record_chunk_parse_error(provider: &str) {
    metrics::counter!("brief_chunk_parse_errors_total", "provider" => provider.to_string())
        .increment(1);
}

/// Context for tracking a request through the orchestrator
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Short identifier for log correlation
    pub trace_id: String,
    /// Caller-supplied request id
    pub request_id: String,
    pub start_time: Instant,
    pub provider: String,
    pub model: Option<String>,
    /// Whether this is a follow-up turn
    pub follow_up: bool,
}

impl RequestContext {
    pub fn new(request_id: &str, provider: &str) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string()[..8].to_string(),
            request_id: request_id.to_string(),
            start_time: Instant::now(),
            provider: provider.to_string(),
            model: None,
            follow_up: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.model = (!model.is_empty()).then_some(model);
        self
    }

    pub fn with_follow_up(mut self, follow_up: bool) -> Self {
        self.follow_up = follow_up;
        self
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn log_request_start(&self) {
        info!(
            trace_id = %self.trace_id,
            request_id = %self.request_id,
            provider = %self.provider,
            model = ?self.model,
            follow_up = %self.follow_up,
            "Request started"
        );
    }

    pub fn log_upstream_request(&self, host: Option<&str>, body_size: usize) {
        debug!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            host = ?host,
            body_size = %body_size,
            elapsed_ms = %self.elapsed_ms(),
            "Sending request to provider"
        );
    }

    pub fn log_stream_started(&self) {
        info!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            elapsed_ms = %self.elapsed_ms(),
            "Streaming response started"
        );
    }

    pub fn log_stream_ended(&self, deltas: usize, chars: usize) {
        info!(
            trace_id = %self.trace_id,
            request_id = %self.request_id,
            provider = %self.provider,
            deltas = %deltas,
            chars = %chars,
            elapsed_ms = %self.elapsed_ms(),
            "Streaming response ended"
        );
    }

    pub fn log_chunk_parse_error(&self, error: &str) {
        warn!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            error = %error,
            "Skipping malformed stream line"
        );
    }

    pub fn log_stalled(&self, timeout_ms: u128, partial_chars: usize) {
        warn!(
            trace_id = %self.trace_id,
            request_id = %self.request_id,
            provider = %self.provider,
            timeout_ms = %timeout_ms,
            partial_chars = %partial_chars,
            elapsed_ms = %self.elapsed_ms(),
            "Stream stalled"
        );
    }

    pub fn log_cancelled(&self) {
        info!(
            trace_id = %self.trace_id,
            request_id = %self.request_id,
            provider = %self.provider,
            elapsed_ms = %self.elapsed_ms(),
            "Request cancelled"
        );
    }

    pub fn log_error(&self, error: &str) {
        error!(
            trace_id = %self.trace_id,
            request_id = %self.request_id,
            provider = %self.provider,
            model = ?self.model,
            follow_up = %self.follow_up,
            elapsed_ms = %self.elapsed_ms(),
            error = %error,
            "Request failed"
        );
    }

    /// Create a tracing span for this request
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "brief_request",
            trace_id = %self.trace_id,
            request_id = %self.request_id,
            provider = %self.provider,
        )
    }
}
