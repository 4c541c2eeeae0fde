//! Reconnect backoff for agent stream failures.
//!
//! Only connection-class failures are retried, and not TLS ones: a rejected
//! certificate does not heal between attempts. HTTP status errors and
//! malformed requests surface immediately.

use ev_core::config::RetryPolicy;
use ev_stream::ConnectionKind;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    /// Retryable, but the policy's budget is spent.
    Exhausted,
    NotRetryable,
}

/// Delay before retry attempt `attempt` (0-based).
pub fn compute_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let delay_ms = (policy.backoff_ms as f64) * policy.backoff_multiplier.powi(attempt as i32);
    let capped = delay_ms.min(policy.max_backoff_ms as f64).max(0.0) as u64;
    Duration::from_millis(capped)
}

/// What to do after failed attempt `attempt` (0-based). `kind` is the
/// connection classification, `None` for non-connection failures.
pub fn decide(policy: &RetryPolicy, attempt: u32, kind: Option<ConnectionKind>) -> RetryDecision {
    match kind {
        None | Some(ConnectionKind::Tls) => RetryDecision::NotRetryable,
        Some(_) if attempt < policy.max_retries => {
            RetryDecision::Retry(compute_delay(policy, attempt))
        }
        Some(_) => RetryDecision::Exhausted,
    }
}
