//! Trace query API — narrow a span set before grouping or export.

use ev_core::trace::{Span, SpanStatus, RUN_ID_ATTR};

/// Query parameters for trace lookup.
#[derive(Debug, Default, Clone)]
pub struct TraceQuery {
    pub trace_id: Option<String>,
    pub run_ids: Vec<String>,
    pub status: Option<SpanStatus>,
    pub limit: Option<usize>,
}

impl TraceQuery {
    pub fn for_trace(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: Some(trace_id.into()),
            ..Default::default()
        }
    }

    pub fn for_runs(run_ids: Vec<String>) -> Self {
        Self {
            run_ids,
            ..Default::default()
        }
    }

    pub fn matches(&self, span: &Span) -> bool {
        self.trace_id.as_deref().map_or(true, |t| span.trace_id == t)
            && (self.run_ids.is_empty()
                || span
                    .attribute_str(RUN_ID_ATTR)
                    .is_some_and(|r| self.run_ids.iter().any(|id| id == r)))
            && self.status.map_or(true, |s| span.status == s)
    }
}

/// Apply `query` to an in-memory span list, keeping input order.
pub fn filter_spans<'a>(spans: &'a [Span], query: &TraceQuery) -> Vec<&'a Span> {
    spans
        .iter()
        .filter(|s| query.matches(s))
        .take(query.limit.unwrap_or(usize::MAX))
        .collect()
}
