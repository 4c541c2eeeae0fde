//! ev-trace: correlate flat span records into per-trace summaries and trees.

pub mod cache;
pub mod export;
pub mod group;
pub mod latency;
pub mod query;
pub mod store;
pub mod tree;

pub use group::group_by_trace;
pub use latency::latency_buckets;
pub use tree::build_tree;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("database error: {0}")]
    Database(String),
    #[error("trace not found: {0}")]
    NotFound(String),
    #[error("export error: {0}")]
    Export(String),
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use ev_core::trace::{Span, SpanStatus};

    pub fn at(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    pub fn span(trace: &str, id: &str, parent: Option<&str>, start_ms: i64, end_ms: i64) -> Span {
        Span {
            span_id: id.into(),
            trace_id: trace.into(),
            parent_span_id: parent.map(Into::into),
            name: format!("op-{id}"),
            start_time: at(start_ms),
            end_time: at(end_ms),
            status: SpanStatus::Ok,
            attributes: Default::default(),
            events: None,
        }
    }
}
