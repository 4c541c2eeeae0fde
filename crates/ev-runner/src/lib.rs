//! ev-runner: wires stream consumption, trace assembly and stats
//! reconciliation together for one process.

pub mod context;
pub mod orchestrator;
pub mod retry;

pub use context::RunContext;
pub use orchestrator::{Orchestrator, TraceView};

use ev_stats::StatsError;
use ev_stream::StreamError;
use ev_trace::TraceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
    #[error("trace error: {0}")]
    Trace(#[from] TraceError),
    #[error("stats error: {0}")]
    Stats(#[from] StatsError),
    #[error("invalid agent endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: StreamError,
    },
}
