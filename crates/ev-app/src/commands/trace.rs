//! Span import and trace queries.

use crate::cli::TracesArgs;
use crate::state::AppState;
use anyhow::{bail, Context};
use ev_core::trace::{Span, SpanStatus};
use ev_trace::export::export_json;
use ev_trace::query::TraceQuery;
use serde_json::json;
use std::path::Path;

pub fn import_spans(state: &AppState, file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let spans = parse_spans(&text)?;
    let inserted = state.orchestrator.ingest_spans(&spans)?;
    super::print_json(&json!({ "received": spans.len(), "inserted": inserted }))
}

/// A JSON array of spans, or one span per line.
fn parse_spans(text: &str) -> anyhow::Result<Vec<Span>> {
    if text.trim_start().starts_with('[') {
        return serde_json::from_str(text).context("parsing span array");
    }
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("parsing span on line {}", i + 1))
        })
        .collect()
}

pub fn traces(state: &AppState, args: &TracesArgs) -> anyhow::Result<()> {
    let Some(trace_id) = &args.trace else {
        let view = state.orchestrator.trace_view(&args.runs)?;
        println!("{}", export_json(&view)?);
        return Ok(());
    };

    let query = TraceQuery {
        status: args.status.as_deref().map(parse_status).transpose()?,
        limit: args.limit,
        ..TraceQuery::for_trace(trace_id.as_str())
    };
    let spans = state.orchestrator.query_spans(&query)?;
    println!("{}", export_json(&spans)?);
    Ok(())
}

pub fn tree(state: &AppState, trace_id: &str) -> anyhow::Result<()> {
    let forest = state.orchestrator.span_tree(trace_id)?;
    println!("{}", export_json(&forest)?);
    Ok(())
}

fn parse_status(raw: &str) -> anyhow::Result<SpanStatus> {
    match raw.to_ascii_lowercase().as_str() {
        "ok" => Ok(SpanStatus::Ok),
        "error" => Ok(SpanStatus::Error),
        "unset" => Ok(SpanStatus::Unset),
        other => bail!("unknown span status `{other}` (expected ok, error or unset)"),
    }
}
