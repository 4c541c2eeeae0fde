//! Trace types — span records ingested from the trace store and the
//! summaries derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribute key carrying the emitting service's name.
pub const SERVICE_NAME_ATTR: &str = "service.name";

/// Attribute key linking a span to the evaluation run that produced it.
pub const RUN_ID_ATTR: &str = "run.id";

// ---------------------------------------------------------------------------
// Span: one timed operation, immutable once ingested
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub span_id: String,

    pub trace_id: String,

    /// Parent span, if any. May reference a span that was never exported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,

    pub name: String,

    pub start_time: DateTime<Utc>,

    pub end_time: DateTime<Utc>,

    #[serde(default)]
    pub status: SpanStatus,

    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<SpanEvent>>,
}

impl Span {
    /// The span is a root by declaration (no parent id at all).
    pub fn is_declared_root(&self) -> bool {
        self.parent_span_id.as_deref().map_or(true, str::is_empty)
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpanStatus {
    Ok,
    Error,
    #[default]
    Unset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanEvent {
    pub name: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// Per-trace rollup. Recomputed on demand, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    pub trace_id: String,
    pub root_span_name: String,
    pub service_name: String,
    pub start_time: DateTime<Utc>,
    /// Milliseconds between the earliest start and the latest end in the trace.
    pub duration: i64,
    pub span_count: usize,
    pub has_errors: bool,
}

/// A span with its children linked in, ordered by start time.
///
/// Measuring and dropping walk the tree without recursion, so exported
/// chains of any depth are safe to hold. Serializing still recurses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpanNode {
    #[serde(flatten)]
    pub span: Span,
    pub children: Vec<SpanNode>,
}

impl SpanNode {
    pub fn leaf(span: Span) -> Self {
        Self {
            span,
            children: Vec::new(),
        }
    }

    /// Number of spans in this subtree, including this one.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(node.children.iter().map(|c| (c, level + 1)));
        }
        deepest
    }
}

impl Drop for SpanNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

// ---------------------------------------------------------------------------
// Latency histogram
// ---------------------------------------------------------------------------

/// Half-open `[min_ms, max_ms)` bucket. `max_ms = None` is unbounded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LatencyEdge {
    pub label: String,
    pub min_ms: i64,
    #[serde(default)]
    pub max_ms: Option<i64>,
}

impl LatencyEdge {
    pub fn new(label: impl Into<String>, min_ms: i64, max_ms: Option<i64>) -> Self {
        Self {
            label: label.into(),
            min_ms,
            max_ms,
        }
    }

    pub fn contains(&self, duration_ms: i64) -> bool {
        duration_ms >= self.min_ms && self.max_ms.map_or(true, |max| duration_ms < max)
    }

    /// The buckets used by the dashboard latency histogram.
    pub fn standard() -> Vec<LatencyEdge> {
        vec![
            LatencyEdge::new("<100ms", 0, Some(100)),
            LatencyEdge::new("100-500ms", 100, Some(500)),
            LatencyEdge::new("500ms-1s", 500, Some(1_000)),
            LatencyEdge::new("1-5s", 1_000, Some(5_000)),
            LatencyEdge::new("5-10s", 5_000, Some(10_000)),
            LatencyEdge::new(">10s", 10_000, None),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LatencyBucket {
    pub label: String,
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
