//! Stream orchestrator
//!
//! Drives one request from submission to a terminal outcome: prepares the
//! canonical input, picks the provider adapter, performs the streamed call
//! and forwards every text delta to the request's destination. Any number of
//! requests may run concurrently, each on its own tokio task, keyed by the
//! caller's opaque id.
//!
//! Event contract per request:
//!
//! - completion: `delta`*, `stream_end`, `loading_ended`
//! - soft completion after a stall: `delta`+, `notice`, `stream_end`, `loading_ended`
//! - failure: `delta`*, `loading_ended`, `error`, `input_unlocked`
//! - cancellation: `delta`*, then only what `Orchestrator::cancel` emits
//!
//! Every submission starts with `loading_started`.

pub mod deadline;
pub mod input;

use std::fmt;
use std::sync::{Arc, RwLock};

use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, Instrument};

use self::deadline::{race, Raced};
use self::input::{custom_prompt_banner, dry_run_report, prepare, PreparedInput};
use crate::config::{Config, ProviderConfig};
use crate::error::{ErrorKind, RelayError};
use crate::native::session::{RequestRegistry, SessionHandle};
use crate::native::translate::{adapter_for, ProviderAdapter};
use crate::native::types::Input;
use crate::observability::{self, RequestContext};
use crate::sink::{EventSink, Placeholder};
use crate::streaming::{data_payload, SseLineBuffer};
use crate::transport::{ByteStream, HttpTransport, Transport, WireRequest};

/// Appended to a partial response when the provider went silent mid-stream
pub const STALL_NOTICE: &str = "\n\n---\n⚠ *Stream interrupted: the API stopped sending data mid-response. You can ask a follow-up to continue.*";

/// Full response reported for an initial request in dry-run mode
pub const DRY_RUN_RESPONSE: &str = "[Debug Mode: No API Call Made]";

/// Shown on the destination after a user-initiated stop
pub const STOPPED_NOTICE: &str = "[Info] Request stopped by user.";

/// One request handed to the orchestrator
#[derive(Clone)]
pub struct SubmitRequest {
    /// Opaque caller-chosen identifier, also used by `cancel`
    pub id: String,
    pub input: Input,
    pub destination: Arc<dyn EventSink>,
    /// Replaces the system prompt for an initial request
    pub custom_prompt: Option<String>,
    /// Slash-command name the custom prompt came from, for display
    pub command_name: Option<String>,
}

impl SubmitRequest {
    pub fn new(id: impl Into<String>, input: impl Into<Input>, destination: Arc<dyn EventSink>) -> Self {
        Self {
            id: id.into(),
            input: input.into(),
            destination,
            custom_prompt: None,
            command_name: None,
        }
    }

    pub fn with_custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.custom_prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    pub fn with_command_name(mut self, name: impl Into<String>) -> Self {
        self.command_name = Some(name.into());
        self
    }
}

impl fmt::Debug for SubmitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitRequest")
            .field("id", &self.id)
            .field("input", &self.input)
            .field("custom_prompt", &self.custom_prompt)
            .field("command_name", &self.command_name)
            .finish_non_exhaustive()
    }
}

/// Where a request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Sending,
    Streaming,
    Completed,
    Cancelled,
    Errored,
    Stalled,
}

impl StreamPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamPhase::Idle => "idle",
            StreamPhase::Sending => "sending",
            StreamPhase::Streaming => "streaming",
            StreamPhase::Completed => "completed",
            StreamPhase::Cancelled => "cancelled",
            StreamPhase::Errored => "errored",
            StreamPhase::Stalled => "stalled",
        }
    }
}

/// How a request ended
#[derive(Debug)]
pub enum Outcome {
    /// The provider closed the stream normally
    Completed { full_response: String },
    /// The stream stalled after some text had arrived
    SoftCompleted { partial: String },
    /// Dry-run mode, nothing was sent
    DryRun,
    /// Stopped by `cancel` or superseded by a newer request with the same id
    Cancelled,
    Failed(RelayError),
}

impl Outcome {
    /// Response text reported to the destination, if any
    pub fn response(&self) -> Option<&str> {
        match self {
            Outcome::Completed { full_response } => Some(full_response),
            Outcome::SoftCompleted { partial } => Some(partial),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// Metrics label
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Completed { .. } => "completed",
            Outcome::SoftCompleted { .. } => "soft_completed",
            Outcome::DryRun => "dry_run",
            Outcome::Cancelled => "cancelled",
            Outcome::Failed(e) => match e.kind() {
                ErrorKind::Config => "error_config",
                ErrorKind::Http => "error_http",
                ErrorKind::Timeout => "error_timeout",
                ErrorKind::Stall => "error_stall",
                ErrorKind::Input => "error_input",
                ErrorKind::Network => "error_network",
            },
        }
    }
}

/// Result of handling one complete stream line
enum LineOutcome {
    Skipped,
    Forwarded,
    /// The session was cancelled or superseded
    Gone,
}

/// Concurrent streaming request orchestrator
pub struct Orchestrator {
    config: RwLock<Arc<Config>>,
    registry: Arc<RequestRegistry>,
    transport: Arc<dyn Transport>,
    allow_insecure: bool,
}

impl Orchestrator {
    /// Create an orchestrator sending requests through `transport`
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            registry: Arc::new(RequestRegistry::new()),
            transport,
            allow_insecure: false,
        }
    }

    /// Create an orchestrator on top of a shared reqwest client
    pub fn with_http_client(config: Config, client: reqwest::Client) -> Self {
        Self::new(config, Arc::new(HttpTransport::new(client)))
    }

    /// Create an orchestrator that also accepts plain-HTTP endpoints
    ///
    /// Mock servers listen on `http://127.0.0.1`, which the HTTPS check would
    /// otherwise reject before any request is made.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_testing(config: Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            allow_insecure: true,
            ..Self::new(config, transport)
        }
    }

    /// Replace the configuration used by requests submitted from now on
    pub fn set_config(&self, config: Config) {
        let mut current = self.config.write().unwrap_or_else(|e| e.into_inner());
        *current = Arc::new(config);
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> Arc<Config> {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.registry
    }

    /// Start a request on its own task
    ///
    /// `loading_started` is emitted and the session registered before this
    /// returns, so an immediate `cancel` with the same id is honoured.
    pub fn submit(self: &Arc<Self>, request: SubmitRequest) -> JoinHandle<Outcome> {
        let handle = self.begin(&request);
        let this = Arc::clone(self);
        tokio::spawn(async move { this.drive(handle, request).await })
    }

    /// Run a request to completion on the current task
    pub async fn run(&self, request: SubmitRequest) -> Outcome {
        let handle = self.begin(&request);
        self.drive(handle, request).await
    }

    /// Stop a request
    ///
    /// Aborts the pending call or stream read and retires the session. No
    /// `delta` for it is forwarded after this returns. Unknown or finished
    /// ids are a no-op and return `false`.
    pub fn cancel(&self, id: &str) -> bool {
        match self.registry.cancel(id) {
            Some(session) => {
                session.destination.loading_ended(id);
                session.destination.notice(id, STOPPED_NOTICE);
                info!(request_id = %id, "Request stopped by user");
                true
            }
            None => {
                debug!(request_id = %id, "Cancel for unknown request ignored");
                false
            }
        }
    }

    fn begin(&self, request: &SubmitRequest) -> SessionHandle {
        request.destination.loading_started(&request.id);
        self.registry.create(&request.id, request.destination.clone())
    }

    async fn drive(&self, handle: SessionHandle, request: SubmitRequest) -> Outcome {
        let config = self.config();
        let provider = config.provider_config();
        let adapter = adapter_for(provider.kind);

        let ctx = RequestContext::new(&handle.id, adapter.name())
            .with_model(provider.model.clone())
            .with_follow_up(!request.input.is_initial());
        let span = ctx.create_span();

        let outcome = self
            .execute(&handle, &request, &config, &provider, adapter, &ctx)
            .instrument(span)
            .await;

        observability::record_request(outcome.label(), adapter.name(), ctx.elapsed_secs());
        outcome
    }

    async fn execute(
        &self,
        handle: &SessionHandle,
        request: &SubmitRequest,
        config: &Config,
        provider: &ProviderConfig,
        adapter: &'static dyn ProviderAdapter,
        ctx: &RequestContext,
    ) -> Outcome {
        ctx.log_request_start();
        debug!(phase = StreamPhase::Idle.as_str(), "Preparing request");

        let custom_prompt = match request.input {
            Input::Initial(_) => request.custom_prompt.as_deref(),
            Input::FollowUp(_) => None,
        };

        let prepared = match prepare(&request.input, custom_prompt, config) {
            Ok(prepared) => prepared,
            Err(e) => return self.fail(handle, ctx, e),
        };

        if config.debug_mode {
            return self.dry_run(handle, ctx, request, custom_prompt, provider, &prepared);
        }

        let url = match provider.validate_endpoint(self.allow_insecure) {
            Ok(url) => url,
            Err(e) => return self.fail(handle, ctx, e),
        };
        let headers = match adapter.build_headers(&provider.api_key) {
            Ok(headers) => headers,
            Err(e) => return self.fail(handle, ctx, e),
        };
        let body = adapter.transform_request(&prepared.messages, &provider.model, &prepared.system_prompt);
        let wire = WireRequest {
            url: adapter.request_url(&url, &provider.api_key),
            headers,
            body,
        };

        if let Some(custom) = custom_prompt {
            handle.destination.notice(
                &handle.id,
                &custom_prompt_banner(custom, request.command_name.as_deref()),
            );
        }

        debug!(phase = StreamPhase::Sending.as_str(), "Sending request");
        ctx.log_upstream_request(url.host_str(), body_size(&wire.body));

        let stream = match race(
            self.transport.post_stream(wire),
            config.request_timeout,
            &handle.token,
        )
        .await
        {
            Raced::Ready(Ok(stream)) => stream,
            Raced::Ready(Err(e)) => return self.fail(handle, ctx, e),
            Raced::TimedOut => return self.fail(handle, ctx, RelayError::Timeout),
            Raced::Cancelled => return cancelled(ctx),
        };

        ctx.log_stream_started();
        debug!(phase = StreamPhase::Streaming.as_str(), "Reading response body");
        self.read_stream(handle, stream, config, adapter, ctx, prepared.original_context.as_deref())
            .await
    }

    async fn read_stream(
        &self,
        handle: &SessionHandle,
        mut stream: ByteStream,
        config: &Config,
        adapter: &'static dyn ProviderAdapter,
        ctx: &RequestContext,
        original_context: Option<&str>,
    ) -> Outcome {
        let mut buffer = SseLineBuffer::new();
        let mut deltas = 0usize;

        loop {
            if !self.registry.is_live(handle) {
                return cancelled(ctx);
            }

            match race(stream.next(), config.chunk_timeout, &handle.token).await {
                Raced::Cancelled => return cancelled(ctx),
                Raced::TimedOut => {
                    drop(stream);
                    return self.stalled(handle, ctx, config, original_context);
                }
                Raced::Ready(Some(Err(e))) => return self.fail(handle, ctx, e),
                Raced::Ready(Some(Ok(bytes))) => {
                    for line in buffer.feed(&bytes) {
                        match self.process_line(handle, adapter, ctx, &line) {
                            LineOutcome::Forwarded => deltas += 1,
                            LineOutcome::Skipped => {}
                            LineOutcome::Gone => return cancelled(ctx),
                        }
                    }
                }
                Raced::Ready(None) => {
                    if let Some(line) = buffer.take_remaining() {
                        match self.process_line(handle, adapter, ctx, &line) {
                            LineOutcome::Forwarded => deltas += 1,
                            LineOutcome::Skipped => {}
                            LineOutcome::Gone => return cancelled(ctx),
                        }
                    }
                    return self.complete(handle, ctx, deltas, original_context);
                }
            }
        }
    }

    fn process_line(
        &self,
        handle: &SessionHandle,
        adapter: &dyn ProviderAdapter,
        ctx: &RequestContext,
        line: &str,
    ) -> LineOutcome {
        if !self.registry.is_live(handle) {
            return LineOutcome::Gone;
        }

        let Some(payload) = data_payload(line) else {
            return LineOutcome::Skipped;
        };
        if payload.is_empty() || adapter.is_stream_end(payload) {
            return LineOutcome::Skipped;
        }

        let chunk: Value = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                ctx.log_chunk_parse_error(&e.to_string());
                observability::record_chunk_parse_error(adapter.name());
                return LineOutcome::Skipped;
            }
        };

        match adapter.parse_stream_chunk(&chunk) {
            Some(text) => {
                if self.registry.forward_delta(handle, &text) {
                    observability::record_delta(adapter.name());
                    LineOutcome::Forwarded
                } else {
                    LineOutcome::Gone
                }
            }
            None => LineOutcome::Skipped,
        }
    }

    fn complete(
        &self,
        handle: &SessionHandle,
        ctx: &RequestContext,
        deltas: usize,
        original_context: Option<&str>,
    ) -> Outcome {
        let Some(session) = self.registry.retire(handle) else {
            return cancelled(ctx);
        };

        let full_response = session.accumulated_text;
        ctx.log_stream_ended(deltas, full_response.chars().count());
        debug!(phase = StreamPhase::Completed.as_str(), "Request completed");

        handle
            .destination
            .stream_end(&handle.id, &full_response, original_context);
        handle.destination.loading_ended(&handle.id);
        Outcome::Completed { full_response }
    }

    fn stalled(
        &self,
        handle: &SessionHandle,
        ctx: &RequestContext,
        config: &Config,
        original_context: Option<&str>,
    ) -> Outcome {
        let Some(session) = self.registry.retire(handle) else {
            return cancelled(ctx);
        };

        let partial = session.accumulated_text;
        ctx.log_stalled(config.chunk_timeout.as_millis(), partial.chars().count());
        debug!(phase = StreamPhase::Stalled.as_str(), "Stream stalled");

        if partial.is_empty() {
            return self.report_error(handle, ctx, RelayError::Stalled);
        }

        handle.destination.notice(&handle.id, STALL_NOTICE);
        handle
            .destination
            .stream_end(&handle.id, &partial, original_context);
        handle.destination.loading_ended(&handle.id);
        Outcome::SoftCompleted { partial }
    }

    fn dry_run(
        &self,
        handle: &SessionHandle,
        ctx: &RequestContext,
        request: &SubmitRequest,
        custom_prompt: Option<&str>,
        provider: &ProviderConfig,
        prepared: &PreparedInput,
    ) -> Outcome {
        let report = match dry_run_report(
            &request.input,
            custom_prompt,
            request.command_name.as_deref(),
            &provider.model,
            &provider.endpoint,
            &provider.system_prompt,
        ) {
            Ok(report) => report,
            Err(e) => return self.fail(handle, ctx, e),
        };

        if self.registry.retire(handle).is_none() {
            return cancelled(ctx);
        }
        info!(request_id = %handle.id, "Dry run, no request sent");

        let dest = &handle.destination;
        dest.loading_ended(&handle.id);
        dest.notice(&handle.id, &report);
        match &prepared.original_context {
            Some(context) => dest.stream_end(&handle.id, DRY_RUN_RESPONSE, Some(context)),
            None => dest.input_unlocked(&handle.id, Placeholder::FollowUp),
        }
        Outcome::DryRun
    }

    /// Error path: retire the session, then report unless it was cancelled
    fn fail(&self, handle: &SessionHandle, ctx: &RequestContext, error: RelayError) -> Outcome {
        if self.registry.retire(handle).is_none() {
            return cancelled(ctx);
        }
        self.report_error(handle, ctx, error)
    }

    /// Emit the error events for a session that has already been retired
    fn report_error(&self, handle: &SessionHandle, ctx: &RequestContext, error: RelayError) -> Outcome {
        ctx.log_error(&error.to_string());
        debug!(phase = StreamPhase::Errored.as_str(), kind = error.kind().as_str(), "Request failed");

        let dest = &handle.destination;
        dest.loading_ended(&handle.id);
        dest.error(&handle.id, &error.user_message());
        dest.input_unlocked(&handle.id, Placeholder::FollowUp);
        Outcome::Failed(error)
    }
}

fn cancelled(ctx: &RequestContext) -> Outcome {
    ctx.log_cancelled();
    debug!(phase = StreamPhase::Cancelled.as_str(), "Request cancelled");
    Outcome::Cancelled
}

fn body_size(body: &Value) -> usize {
    serde_json::to_vec(body).map(|b| b.len()).unwrap_or_default()
}
