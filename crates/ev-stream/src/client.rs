//! Event-stream client — one streaming HTTP request per `consume` call.
//!
//! The read loop races three things: an abort signal, a periodic idle
//! check, and the next body chunk. Whichever wins decides the outcome;
//! dropping the body stream on exit tears the connection down.

use crate::sse::SseDecoder;
use crate::{CompletionReason, StreamError};
use ev_core::config::StreamConfig;
use ev_core::event::AgUiEvent;
use futures_util::StreamExt;
use reqwest::{Client as HttpClient, Method};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// How much of a malformed payload to echo into the logs.
const LOG_PAYLOAD_LIMIT: usize = 200;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Stop right after delivering a run-end sentinel.
    pub complete_on_run_end: bool,
    pub idle_timeout: Duration,
    pub idle_check_interval: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}

impl StreamOptions {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            method: Method::POST,
            headers: Vec::new(),
            body: None,
            complete_on_run_end: config.complete_on_run_end,
            idle_timeout: config.idle_timeout(),
            idle_check_interval: config.idle_check_interval(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn complete_on_run_end(mut self, enabled: bool) -> Self {
        self.complete_on_run_end = enabled;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn idle_check_interval(mut self, interval: Duration) -> Self {
        self.idle_check_interval = interval.max(Duration::from_millis(1));
        self
    }
}

/// HTTP client for streaming. No overall request timeout: the body is
/// bounded by the idle check instead.
pub fn http_client(config: &StreamConfig) -> Result<HttpClient, StreamError> {
    HttpClient::builder()
        .connect_timeout(config.connect_timeout())
        .build()
        .map_err(StreamError::Request)
}

// ---------------------------------------------------------------------------
// Abort handle
// ---------------------------------------------------------------------------

/// Idempotent, callable from any task or from inside the event callback.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    token: CancellationToken,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Session lifecycle, traced on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamState {
    Idle,
    Connecting,
    Streaming,
    RunEndSentinel,
    IdleTimeout,
    ConnectionClosed,
    Aborted,
    Error,
    Terminated,
}

impl StreamState {
    fn completed(reason: &CompletionReason) -> Self {
        match reason {
            CompletionReason::Event(_) => StreamState::RunEndSentinel,
            CompletionReason::IdleTimeout => StreamState::IdleTimeout,
            CompletionReason::ConnectionClosed => StreamState::ConnectionClosed,
            CompletionReason::Aborted => StreamState::Aborted,
        }
    }
}

// ---------------------------------------------------------------------------
// EventStream
// ---------------------------------------------------------------------------

/// A single-use stream session. `consume` takes `self`, so nothing carries
/// over between invocations.
pub struct EventStream {
    http: HttpClient,
    url: String,
    options: StreamOptions,
    abort: AbortHandle,
    state: StreamState,
    last_chunk_at: Instant,
    delivered: usize,
    parse_failures: usize,
}

impl EventStream {
    pub fn new(http: HttpClient, url: impl Into<String>, options: StreamOptions) -> Self {
        Self {
            http,
            url: url.into(),
            options,
            abort: AbortHandle::default(),
            state: StreamState::Idle,
            last_chunk_at: Instant::now(),
            delivered: 0,
            parse_failures: 0,
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Stream events into `on_event` until the run ends, the connection goes
    /// idle or closes, or the session is aborted.
    pub async fn consume<F>(mut self, mut on_event: F) -> Result<CompletionReason, StreamError>
    where
        F: FnMut(&AgUiEvent),
    {
        let outcome = self.run(&mut on_event).await;
        match &outcome {
            Ok(reason) => {
                self.transition(StreamState::completed(reason));
                tracing::info!(
                    url = %self.url,
                    reason = %reason,
                    events = self.delivered,
                    parse_failures = self.parse_failures,
                    "event stream completed"
                );
            }
            Err(e) => {
                self.transition(StreamState::Error);
                tracing::warn!(
                    url = %self.url,
                    events = self.delivered,
                    error = %e,
                    "event stream failed"
                );
            }
        }
        // Any teardown after this point is expected, not a failure.
        self.abort.abort();
        self.transition(StreamState::Terminated);
        outcome
    }

    async fn run<F>(&mut self, on_event: &mut F) -> Result<CompletionReason, StreamError>
    where
        F: FnMut(&AgUiEvent),
    {
        let token = self.abort.token.clone();
        self.transition(StreamState::Connecting);

        let mut request = self
            .http
            .request(self.options.method.clone(), &self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        for (name, value) in &self.options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &self.options.body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(CompletionReason::Aborted),
            sent = request.send() => sent.map_err(StreamError::from_reqwest)?,
        };

        let status = response.status();
        if !status.is_success() {
            // The error body gets the same abort and idle bounds as events.
            let body = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(CompletionReason::Aborted),
                text = tokio::time::timeout(self.options.idle_timeout, response.text()) => {
                    match text {
                        Ok(Ok(text)) => text,
                        Ok(Err(e)) => {
                            tracing::debug!(error = %e, "unreadable error body");
                            String::new()
                        }
                        Err(_) => {
                            tracing::debug!(status = status.as_u16(), "error body stalled");
                            String::new()
                        }
                    }
                }
            };
            return Err(StreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        self.transition(StreamState::Streaming);
        self.last_chunk_at = Instant::now();

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut idle_check = tokio::time::interval_at(
            Instant::now() + self.options.idle_check_interval,
            self.options.idle_check_interval,
        );
        idle_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(CompletionReason::Aborted),
                _ = idle_check.tick() => {
                    if self.is_idle() {
                        return Ok(CompletionReason::IdleTimeout);
                    }
                }
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        self.last_chunk_at = Instant::now();
                        for payload in decoder.push(&bytes) {
                            if let Some(reason) = self.deliver(&payload, on_event) {
                                return Ok(reason);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        if token.is_cancelled() {
                            return Ok(CompletionReason::Aborted);
                        }
                        return Err(StreamError::from_reqwest(e));
                    }
                    None => {
                        if let Some(payload) = decoder.finish() {
                            if let Some(reason) = self.deliver(&payload, on_event) {
                                return Ok(reason);
                            }
                        }
                        return Ok(CompletionReason::ConnectionClosed);
                    }
                },
            }
        }
    }

    /// Parse and hand one payload to the callback. Returns a completion
    /// reason when the stream should stop here.
    fn deliver<F>(&mut self, payload: &str, on_event: &mut F) -> Option<CompletionReason>
    where
        F: FnMut(&AgUiEvent),
    {
        let event = match AgUiEvent::parse(payload) {
            Ok(event) => event,
            Err(e) => {
                self.parse_failures += 1;
                tracing::warn!(
                    error = %e,
                    payload = %truncate(payload, LOG_PAYLOAD_LIMIT),
                    "skipping malformed event"
                );
                return None;
            }
        };

        on_event(&event);
        self.delivered += 1;

        if self.options.complete_on_run_end && event.is_terminal() {
            return Some(CompletionReason::Event(event.kind));
        }
        if self.abort.is_aborted() {
            return Some(CompletionReason::Aborted);
        }
        None
    }

    /// Only a stream that has produced something can go idle.
    fn is_idle(&self) -> bool {
        self.delivered > 0 && self.last_chunk_at.elapsed() > self.options.idle_timeout
    }

    fn transition(&mut self, next: StreamState) {
        tracing::debug!(url = %self.url, from = ?self.state, to = ?next, "stream state");
        self.state = next;
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
