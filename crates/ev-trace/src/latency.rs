//! Latency histogram over trace durations.

use ev_core::trace::{LatencyBucket, LatencyEdge, TraceSummary};

/// Count each summary into the first edge containing its duration. A
/// duration outside every edge is dropped.
pub fn latency_buckets(summaries: &[TraceSummary], edges: &[LatencyEdge]) -> Vec<LatencyBucket> {
    let mut buckets: Vec<LatencyBucket> = edges
        .iter()
        .map(|e| LatencyBucket {
            label: e.label.clone(),
            count: 0,
        })
        .collect();

    for summary in summaries {
        match edges.iter().position(|e| e.contains(summary.duration)) {
            Some(i) => buckets[i].count += 1,
            None => tracing::debug!(
                trace_id = %summary.trace_id,
                duration = summary.duration,
                "duration outside latency buckets"
            ),
        }
    }
    buckets
}

pub fn latency_buckets_standard(summaries: &[TraceSummary]) -> Vec<LatencyBucket> {
    latency_buckets(summaries, &LatencyEdge::standard())
}
