//! Span grouping — partition spans by trace id and roll each partition up
//! into a `TraceSummary`.

use ev_core::trace::{Span, SpanStatus, TraceSummary, SERVICE_NAME_ATTR};
use std::collections::HashMap;

const UNKNOWN_SERVICE: &str = "unknown";

/// Summaries ordered by start time, newest first. Ties keep the order in
/// which their traces first appeared in `spans`.
pub fn group_by_trace(spans: &[Span]) -> Vec<TraceSummary> {
    let mut summaries: Vec<TraceSummary> = partition(spans)
        .into_iter()
        .filter_map(|members| summarize(&members))
        .collect();
    // Stable: equal start times stay in first-occurrence order.
    summaries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    summaries
}

/// Group spans by trace id, preserving first-occurrence order of traces
/// and ingestion order within each trace.
pub fn partition(spans: &[Span]) -> Vec<Vec<&Span>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<&Span>> = Vec::new();
    for span in spans {
        let slot = *index.entry(span.trace_id.as_str()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(span);
    }
    groups
}

/// First declared root, or the first span if every span names a parent.
pub fn root_span<'a>(members: &[&'a Span]) -> Option<&'a Span> {
    members
        .iter()
        .copied()
        .find(|s| s.is_declared_root())
        .or_else(|| members.first().copied())
}

fn summarize(members: &[&Span]) -> Option<TraceSummary> {
    let root = root_span(members)?;
    // Children may start before or end after the root under concurrency.
    let start = members.iter().map(|s| s.start_time).min()?;
    let end = members.iter().map(|s| s.end_time).max()?;

    Some(TraceSummary {
        trace_id: root.trace_id.clone(),
        root_span_name: root.name.clone(),
        service_name: root
            .attribute_str(SERVICE_NAME_ATTR)
            .unwrap_or(UNKNOWN_SERVICE)
            .to_string(),
        start_time: start,
        duration: (end - start).num_milliseconds().max(0),
        span_count: members.len(),
        has_errors: members.iter().any(|s| s.status == SpanStatus::Error),
    })
}
