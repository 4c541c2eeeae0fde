//! ev-stream: consume a server-sent-event stream from an agent endpoint.

pub mod classify;
pub mod client;
pub mod sse;

pub use classify::ConnectionKind;
pub use client::{http_client, AbortHandle, EventStream, StreamOptions};
pub use reqwest::Client as HttpClient;

use ev_core::event::EventKind;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid request: {0}")]
    Request(#[source] reqwest::Error),
    #[error("agent endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("{kind}: {source}")]
    Connection {
        kind: ConnectionKind,
        #[source]
        source: reqwest::Error,
    },
}

impl StreamError {
    pub(crate) fn from_reqwest(source: reqwest::Error) -> Self {
        if source.is_builder() {
            return StreamError::Request(source);
        }
        StreamError::Connection {
            kind: classify::classify(&source),
            source,
        }
    }

    /// Connection-class failures are worth retrying by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StreamError::Connection { .. })
    }

    pub fn connection_kind(&self) -> Option<ConnectionKind> {
        match self {
            StreamError::Connection { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Why `consume` stopped. None of these are failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionReason {
    /// A run-end sentinel was delivered.
    Event(EventKind),
    IdleTimeout,
    ConnectionClosed,
    Aborted,
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionReason::Event(kind) => write!(f, "event:{kind}"),
            CompletionReason::IdleTimeout => f.write_str("idle_timeout"),
            CompletionReason::ConnectionClosed => f.write_str("connection_closed"),
            CompletionReason::Aborted => f.write_str("aborted"),
        }
    }
}

impl Serialize for CompletionReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
