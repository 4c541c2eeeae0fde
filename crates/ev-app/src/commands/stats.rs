//! Benchmark, report and run-stats commands.

use super::{print_json, read_json_arg};
use crate::state::AppState;
use anyhow::Context;
use ev_core::prelude::{Benchmark, Report};
use ev_stats::ReportLookup;
use serde_json::json;

pub async fn put_benchmark(state: &AppState, json: &str) -> anyhow::Result<()> {
    let benchmark: Benchmark =
        serde_json::from_value(read_json_arg(json)?).context("not a benchmark document")?;
    state.evals.put_benchmark(&benchmark)?;
    print_json(&json!({ "benchmarkId": benchmark.id, "runs": benchmark.runs.len() }))
}

pub async fn get_benchmark(state: &AppState, benchmark_id: &str) -> anyhow::Result<()> {
    print_json(&state.orchestrator.read_benchmark(benchmark_id).await?)
}

/// Store a report. When a benchmark is given and the report's metrics just
/// finished, the owning run is reconciled immediately.
pub async fn put_report(
    state: &AppState,
    json: &str,
    benchmark_id: Option<&str>,
) -> anyhow::Result<()> {
    let report: Report =
        serde_json::from_value(read_json_arg(json)?).context("not a report document")?;
    let previous = state
        .evals
        .get_reports(std::slice::from_ref(&report.id))
        .await?
        .remove(&report.id)
        .and_then(|r| r.metrics_status);
    state.evals.put_report(&report)?;

    let reconciled = match benchmark_id {
        Some(benchmark_id) => {
            state
                .orchestrator
                .report_metrics_changed(benchmark_id, &report.id, previous, report.metrics_status)
                .await?
        }
        None => None,
    };
    print_json(&json!({ "reportId": report.id, "reconciled": reconciled }))
}

pub async fn get(state: &AppState, benchmark_id: &str, run_id: &str) -> anyhow::Result<()> {
    print_json(&state.orchestrator.read_run(benchmark_id, run_id).await?)
}

pub async fn refresh(
    state: &AppState,
    benchmark_id: &str,
    run_id: Option<&str>,
) -> anyhow::Result<()> {
    match run_id {
        Some(run_id) => print_json(&state.orchestrator.refresh_run(benchmark_id, run_id).await?),
        None => print_json(&state.orchestrator.refresh_benchmark(benchmark_id).await?),
    }
}

pub async fn patch(
    state: &AppState,
    benchmark_id: &str,
    run_id: &str,
    json: &str,
) -> anyhow::Result<()> {
    let patch = read_json_arg(json)?;
    let stats = state
        .orchestrator
        .patch_stats(benchmark_id, run_id, &patch)
        .await?;
    print_json(&stats)
}
