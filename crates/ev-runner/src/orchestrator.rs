//! Orchestrator — one entry point over the stream client, the span store
//! and the stats reconciler.

use crate::context::RunContext;
use crate::retry::{decide, RetryDecision};
use crate::RunnerError;
use ev_core::config::TelemetryConfig;
use ev_core::run::{Benchmark, MetricsStatus, Run, RunStats};
use ev_core::trace::{LatencyBucket, Span, SpanNode, TraceSummary};
use ev_stats::{RefreshOutcome, ReportLookup, RunStatsReconciler, RunStore};
use ev_stream::{http_client, EventStream, HttpClient, StreamOptions};
use ev_trace::cache::{compute_cache_key, SummaryCache};
use ev_trace::query::{filter_spans, TraceQuery};
use ev_trace::store::SpanStore;
use ev_trace::{build_tree, group_by_trace, latency_buckets, TraceError};
use serde::Serialize;
use std::sync::Arc;

/// Header carrying the run id to the agent, so emitted spans can be tagged.
const RUN_ID_HEADER: &str = "x-evtel-run-id";

/// Summaries plus their latency histogram for a set of runs.
#[derive(Debug, Clone, Serialize)]
pub struct TraceView {
    pub summaries: Vec<TraceSummary>,
    pub buckets: Vec<LatencyBucket>,
}

pub struct Orchestrator {
    config: TelemetryConfig,
    http: HttpClient,
    spans: Arc<SpanStore>,
    reconciler: RunStatsReconciler,
    views: SummaryCache<TraceView>,
}

impl Orchestrator {
    pub fn new(
        config: TelemetryConfig,
        spans: Arc<SpanStore>,
        runs: Arc<dyn RunStore>,
        reports: Arc<dyn ReportLookup>,
    ) -> Result<Self, RunnerError> {
        let http = http_client(&config.stream)?;
        let views = SummaryCache::new(config.trace.cache_capacity);
        Ok(Self {
            config,
            http,
            spans,
            reconciler: RunStatsReconciler::new(runs, reports),
            views,
        })
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn reconciler(&self) -> &RunStatsReconciler {
        &self.reconciler
    }

    // -----------------------------------------------------------------------
    // Agent runs
    // -----------------------------------------------------------------------

    /// Drive one agent run to completion, collecting every event it emits.
    /// Transient connection failures are retried per the configured policy; each
    /// attempt starts a fresh trajectory.
    pub async fn execute_run(
        &self,
        benchmark_id: &str,
        run_id: &str,
        endpoint: &str,
        request: Option<&serde_json::Value>,
    ) -> Result<RunContext, RunnerError> {
        validate_endpoint(endpoint)?;
        let policy = &self.config.runner.retry;
        let mut ctx = RunContext::new(benchmark_id, run_id, endpoint);
        tracing::info!(
            execution_id = %ctx.execution_id,
            benchmark_id,
            run_id,
            endpoint,
            "executing agent run"
        );

        let mut attempt = 0;
        loop {
            ctx.attempts = attempt + 1;
            ctx.events.clear();

            let mut options =
                StreamOptions::from_config(&self.config.stream).header(RUN_ID_HEADER, run_id);
            if let Some(body) = request {
                options = options.body(body.to_string());
            }
            let stream = EventStream::new(self.http.clone(), endpoint, options);
            let events = &mut ctx.events;
            let outcome = stream.consume(|event| events.push(event.clone())).await;

            let e = match outcome {
                Ok(reason) => {
                    tracing::info!(
                        execution_id = %ctx.execution_id,
                        run_id,
                        %reason,
                        events = ctx.events.len(),
                        "agent run finished"
                    );
                    ctx.finish(reason);
                    return Ok(ctx);
                }
                Err(e) => e,
            };

            match decide(policy, attempt, e.connection_kind()) {
                RetryDecision::Retry(delay) => {
                    tracing::warn!(
                        run_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "agent connection failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::Exhausted if attempt > 0 => {
                    return Err(RunnerError::RetriesExhausted {
                        attempts: attempt + 1,
                        source: e,
                    });
                }
                RetryDecision::Exhausted | RetryDecision::NotRetryable => return Err(e.into()),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Traces
    // -----------------------------------------------------------------------

    pub fn ingest_spans(&self, spans: &[Span]) -> Result<usize, RunnerError> {
        Ok(self.spans.insert_spans(spans)?)
    }

    /// Trace summaries and latency buckets for `run_ids`, cached until the
    /// runs gain new spans.
    pub fn trace_view(&self, run_ids: &[String]) -> Result<TraceView, RunnerError> {
        let span_count = self.spans.count_for_runs(run_ids)?;
        let key = compute_cache_key(run_ids, span_count);
        if let Some(view) = self.views.get(&key) {
            tracing::debug!(runs = run_ids.len(), span_count, "trace view cache hit");
            return Ok(view);
        }

        let spans = self.spans.spans_for_runs(run_ids)?;
        let summaries = group_by_trace(&spans);
        let buckets = latency_buckets(&summaries, &self.config.trace.latency_buckets);
        let view = TraceView { summaries, buckets };
        self.views.insert(key, view.clone());
        Ok(view)
    }

    /// Span forest for one trace.
    pub fn span_tree(&self, trace_id: &str) -> Result<Vec<SpanNode>, RunnerError> {
        let spans = self.spans.spans_for_trace(trace_id)?;
        if spans.is_empty() {
            return Err(TraceError::NotFound(trace_id.to_string()).into());
        }
        Ok(build_tree(&spans))
    }

    pub fn query_spans(&self, query: &TraceQuery) -> Result<Vec<Span>, RunnerError> {
        let candidates = match &query.trace_id {
            Some(trace_id) => self.spans.spans_for_trace(trace_id)?,
            None => self.spans.spans_for_runs(&query.run_ids)?,
        };
        Ok(filter_spans(&candidates, query).into_iter().cloned().collect())
    }

    // -----------------------------------------------------------------------
    // Run stats
    // -----------------------------------------------------------------------

    pub async fn read_run(&self, benchmark_id: &str, run_id: &str) -> Result<Run, RunnerError> {
        Ok(self.reconciler.read_run(benchmark_id, run_id).await?)
    }

    pub async fn read_benchmark(&self, benchmark_id: &str) -> Result<Benchmark, RunnerError> {
        Ok(self.reconciler.read_benchmark(benchmark_id).await?)
    }

    pub async fn refresh_run(
        &self,
        benchmark_id: &str,
        run_id: &str,
    ) -> Result<RefreshOutcome, RunnerError> {
        Ok(self.reconciler.refresh_run(benchmark_id, run_id).await?)
    }

    pub async fn refresh_benchmark(
        &self,
        benchmark_id: &str,
    ) -> Result<Vec<RefreshOutcome>, RunnerError> {
        Ok(self.reconciler.refresh_benchmark(benchmark_id).await?)
    }

    pub async fn report_metrics_changed(
        &self,
        benchmark_id: &str,
        report_id: &str,
        previous: Option<MetricsStatus>,
        current: Option<MetricsStatus>,
    ) -> Result<Option<RefreshOutcome>, RunnerError> {
        Ok(self
            .reconciler
            .on_report_metrics_changed(benchmark_id, report_id, previous, current)
            .await?)
    }

    pub async fn patch_stats(
        &self,
        benchmark_id: &str,
        run_id: &str,
        patch: &serde_json::Value,
    ) -> Result<RunStats, RunnerError> {
        Ok(self.reconciler.patch_stats(benchmark_id, run_id, patch).await?)
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), RunnerError> {
    let invalid = |reason: String| RunnerError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };
    let url = url::Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme `{other}`"))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".into()));
    }
    Ok(())
}
