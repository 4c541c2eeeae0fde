//! Heuristic classification of connection failures for operator-facing
//! diagnostics. Advisory only; the raw error always travels alongside.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Dns,
    Refused,
    Tls,
    Timeout,
    Other,
}

impl ConnectionKind {
    /// Short hint shown next to the raw error.
    pub fn hint(self) -> &'static str {
        match self {
            ConnectionKind::Dns => "host name could not be resolved; check the endpoint URL",
            ConnectionKind::Refused => "nothing is listening on the endpoint; is the agent running?",
            ConnectionKind::Tls => "TLS handshake failed; check the certificate or use http://",
            ConnectionKind::Timeout => "the endpoint did not respond in time",
            ConnectionKind::Other => "connection to the agent endpoint failed",
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionKind::Dns => "DNS failure",
            ConnectionKind::Refused => "connection refused",
            ConnectionKind::Tls => "TLS failure",
            ConnectionKind::Timeout => "timeout",
            ConnectionKind::Other => "connection error",
        };
        f.write_str(label)
    }
}

pub fn classify(err: &reqwest::Error) -> ConnectionKind {
    if err.is_timeout() {
        return ConnectionKind::Timeout;
    }
    classify_text(&error_chain(err))
}

/// Classify from the rendered error chain. The underlying crates only
/// expose these causes through their messages.
pub fn classify_text(text: &str) -> ConnectionKind {
    let text = text.to_ascii_lowercase();
    let any = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if any(&["dns error", "failed to lookup", "name or service not known", "no such host", "nodename nor servname"]) {
        ConnectionKind::Dns
    } else if any(&["connection refused", "actively refused"]) {
        ConnectionKind::Refused
    } else if any(&["certificate", "tls", "ssl", "handshake"]) {
        ConnectionKind::Tls
    } else if any(&["timed out", "timeout"]) {
        ConnectionKind::Timeout
    } else {
        ConnectionKind::Other
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
