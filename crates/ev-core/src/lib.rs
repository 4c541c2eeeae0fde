//! ev-core: Shared types for Evtel
//!
//! This crate has zero internal crate dependencies and defines the
//! canonical types used across all other ev-* crates.

pub mod config;
pub mod event;
pub mod run;
pub mod trace;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::config::TelemetryConfig;
    pub use crate::event::{AgUiEvent, EventKind};
    pub use crate::run::{
        Benchmark, MetricsStatus, PassFailStatus, Report, Run, RunResult, RunStats, RunStatus,
    };
    pub use crate::trace::{LatencyBucket, LatencyEdge, Span, SpanNode, SpanStatus, TraceSummary};
}
