//! Run stats reconciler — recompute counters from live evidence and write
//! them back whenever the persisted copy has gone stale.
//!
//! Stats are a pure projection of `(results, reports)`, so concurrent
//! reconciliations of the same run agree on content and need no locking.

use crate::classify::{classify, tally, ReportEvidence};
use crate::patch::validate_patch;
use crate::store::{ReportLookup, RunStore};
use crate::StatsError;
use ev_core::run::{Benchmark, MetricsStatus, Run, RunStats};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Compute counters for `run`. Never fails: missing or unreachable evidence
/// degrades to the most conservative outcome.
pub async fn compute_stats(run: &Run, reports: &dyn ReportLookup) -> RunStats {
    if run.results.is_empty() {
        return RunStats::default();
    }

    let report_ids: Vec<String> = run
        .results
        .values()
        .filter_map(|r| r.report_id())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if report_ids.is_empty() {
        return status_only(run);
    }

    let fetched = match reports.get_reports(&report_ids).await {
        Ok(fetched) => fetched,
        Err(e) => {
            tracing::warn!(run_id = %run.id, error = %e, "report lookup failed; using execution status only");
            return status_only(run);
        }
    };

    let stats = tally(run.results.values().map(|result| {
        let evidence = if result.status.is_in_flight() || result.status.is_execution_failure() {
            ReportEvidence::NotConsulted
        } else {
            match result.report_id() {
                None => ReportEvidence::NoReport,
                Some(id) => fetched
                    .get(id)
                    .map_or(ReportEvidence::Missing, ReportEvidence::Found),
            }
        };
        classify(result.status, evidence)
    }));
    debug_assert!(stats.is_consistent() && stats.total as usize == run.results.len());
    stats
}

fn status_only(run: &Run) -> RunStats {
    tally(
        run.results
            .values()
            .map(|r| classify(r.status, ReportEvidence::NotConsulted)),
    )
}

/// Result of recomputing one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
    pub run_id: String,
    pub stats: RunStats,
    /// The previously persisted value differed (or was absent).
    pub changed: bool,
    /// The write-back succeeded. `stats` is correct either way.
    pub persisted: bool,
}

#[derive(Clone)]
pub struct RunStatsReconciler {
    runs: Arc<dyn RunStore>,
    reports: Arc<dyn ReportLookup>,
}

impl RunStatsReconciler {
    pub fn new(runs: Arc<dyn RunStore>, reports: Arc<dyn ReportLookup>) -> Self {
        Self { runs, reports }
    }

    pub async fn compute(&self, run: &Run) -> RunStats {
        compute_stats(run, self.reports.as_ref()).await
    }

    /// Read a run with fresh stats, persisting them first if they changed.
    pub async fn read_run(&self, benchmark_id: &str, run_id: &str) -> Result<Run, StatsError> {
        let mut run = self
            .runs
            .get_run(benchmark_id, run_id)
            .await?
            .ok_or_else(|| StatsError::NotFound(format!("run {run_id} in benchmark {benchmark_id}")))?;
        self.heal(benchmark_id, &mut run, false).await;
        Ok(run)
    }

    /// Read a benchmark with every run healed independently.
    pub async fn read_benchmark(&self, benchmark_id: &str) -> Result<Benchmark, StatsError> {
        let mut benchmark = self.load_benchmark(benchmark_id).await?;
        for run in &mut benchmark.runs {
            self.heal(benchmark_id, run, false).await;
        }
        Ok(benchmark)
    }

    /// Recompute and unconditionally write one run's stats.
    pub async fn refresh_run(
        &self,
        benchmark_id: &str,
        run_id: &str,
    ) -> Result<RefreshOutcome, StatsError> {
        let mut run = self
            .runs
            .get_run(benchmark_id, run_id)
            .await?
            .ok_or_else(|| StatsError::NotFound(format!("run {run_id} in benchmark {benchmark_id}")))?;
        Ok(self.heal(benchmark_id, &mut run, true).await)
    }

    /// Recompute and unconditionally write every run in a benchmark.
    pub async fn refresh_benchmark(
        &self,
        benchmark_id: &str,
    ) -> Result<Vec<RefreshOutcome>, StatsError> {
        let mut benchmark = self.load_benchmark(benchmark_id).await?;
        let mut outcomes = Vec::with_capacity(benchmark.runs.len());
        for run in &mut benchmark.runs {
            outcomes.push(self.heal(benchmark_id, run, true).await);
        }
        tracing::info!(
            benchmark_id,
            runs = outcomes.len(),
            changed = outcomes.iter().filter(|o| o.changed).count(),
            "benchmark stats refreshed"
        );
        Ok(outcomes)
    }

    /// React to a report's metrics status changing. Only a transition out of
    /// pending/calculating can change the owning run's counters.
    pub async fn on_report_metrics_changed(
        &self,
        benchmark_id: &str,
        report_id: &str,
        previous: Option<MetricsStatus>,
        current: Option<MetricsStatus>,
    ) -> Result<Option<RefreshOutcome>, StatsError> {
        let left_awaiting = previous.is_some_and(|p| p.is_awaiting())
            && !current.is_some_and(|c| c.is_awaiting());
        if !left_awaiting {
            return Ok(None);
        }

        let benchmark = self.load_benchmark(benchmark_id).await?;
        let Some(run) = benchmark.find_run_by_report(report_id) else {
            tracing::debug!(benchmark_id, report_id, "no run references report");
            return Ok(None);
        };
        let mut run = run.clone();
        Ok(Some(self.heal(benchmark_id, &mut run, false).await))
    }

    /// Overwrite a run's stats with operator-supplied values.
    pub async fn patch_stats(
        &self,
        benchmark_id: &str,
        run_id: &str,
        patch: &serde_json::Value,
    ) -> Result<RunStats, StatsError> {
        let stats = validate_patch(patch)?;
        let benchmark = self.load_benchmark(benchmark_id).await?;
        if benchmark.is_sample {
            return Err(StatsError::Validation(format!(
                "benchmark {benchmark_id} is sample data and cannot be modified"
            )));
        }
        if benchmark.find_run(run_id).is_none() {
            return Err(StatsError::NotFound(format!(
                "run {run_id} in benchmark {benchmark_id}"
            )));
        }

        let updated = self
            .runs
            .update_run_stats(benchmark_id, run_id, stats)
            .await
            .map_err(|e| StatsError::Persistence(e.to_string()))?;
        if !updated {
            return Err(StatsError::NotFound(format!(
                "run {run_id} in benchmark {benchmark_id}"
            )));
        }
        tracing::info!(benchmark_id, run_id, ?stats, "stats patched by operator");
        Ok(stats)
    }

    async fn load_benchmark(&self, benchmark_id: &str) -> Result<Benchmark, StatsError> {
        self.runs
            .get_benchmark(benchmark_id)
            .await?
            .ok_or_else(|| StatsError::NotFound(format!("benchmark {benchmark_id}")))
    }

    /// Recompute `run.stats` in place. Writes when stale, or always when
    /// `force` is set. Write failures are logged, never returned.
    async fn heal(&self, benchmark_id: &str, run: &mut Run, force: bool) -> RefreshOutcome {
        let fresh = self.compute(run).await;
        let changed = run.stats != Some(fresh);
        if changed {
            tracing::info!(
                benchmark_id,
                run_id = %run.id,
                old = ?run.stats,
                new = ?fresh,
                "stale run stats detected"
            );
        }

        let persisted = if changed || force {
            self.persist(benchmark_id, &run.id, fresh).await
        } else {
            true
        };

        run.stats = Some(fresh);
        RefreshOutcome {
            run_id: run.id.clone(),
            stats: fresh,
            changed,
            persisted,
        }
    }

    async fn persist(&self, benchmark_id: &str, run_id: &str, stats: RunStats) -> bool {
        match self.runs.update_run_stats(benchmark_id, run_id, stats).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(benchmark_id, run_id, "run vanished before stats write-back");
                false
            }
            Err(e) => {
                tracing::error!(benchmark_id, run_id, error = %e, "failed to persist run stats");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use ev_core::run::{PassFailStatus, Report, RunResult, RunStatus};

    fn completed(report_id: &str) -> RunResult {
        RunResult::new(report_id, RunStatus::Completed)
    }

    fn ready(id: &str, pass: PassFailStatus) -> Report {
        Report::new(id)
            .with_pass_fail(pass)
            .with_metrics(MetricsStatus::Ready)
    }

    fn setup(run: Run, reports: Vec<Report>) -> (Arc<MemoryStore>, RunStatsReconciler) {
        let store = Arc::new(MemoryStore::new());
        store.put_benchmark(Benchmark {
            id: "b1".into(),
            name: "bench".into(),
            runs: vec![run],
            is_sample: false,
        });
        for report in reports {
            store.put_report(report);
        }
        let reconciler = RunStatsReconciler::new(store.clone(), store.clone());
        (store, reconciler)
    }

    fn two_case_run() -> Run {
        Run::new("run-1")
            .with_result("tc1", completed("report1"))
            .with_result("tc2", completed("report2"))
    }

    #[tokio::test]
    async fn empty_run_has_zero_stats() {
        let (store, reconciler) = setup(Run::new("run-1"), vec![]);
        let run = store.get_run("b1", "run-1").await.unwrap().unwrap();
        assert_eq!(reconciler.compute(&run).await, RunStats::default());
        assert_eq!(store.lookup_calls(), 0);
    }

    #[tokio::test]
    async fn one_passed_one_failed() {
        let (_, reconciler) = setup(
            two_case_run(),
            vec![
                ready("report1", PassFailStatus::Passed),
                ready("report2", PassFailStatus::Failed),
            ],
        );
        let stats = reconciler.compute(&two_case_run()).await;
        assert_eq!(stats, RunStats { passed: 1, failed: 1, pending: 0, total: 2 });
    }

    #[tokio::test]
    async fn missing_report_is_pending() {
        let (_, reconciler) = setup(two_case_run(), vec![ready("report1", PassFailStatus::Passed)]);
        let stats = reconciler.compute(&two_case_run()).await;
        assert_eq!(stats, RunStats { passed: 1, failed: 0, pending: 1, total: 2 });
    }

    #[tokio::test]
    async fn awaiting_metrics_is_pending() {
        let run = Run::new("run-1").with_result("tc1", completed("report1"));
        let report = Report::new("report1")
            .with_pass_fail(PassFailStatus::Passed)
            .with_metrics(MetricsStatus::Pending);
        let (_, reconciler) = setup(run.clone(), vec![report]);
        let stats = reconciler.compute(&run).await;
        assert_eq!(stats, RunStats { passed: 0, failed: 0, pending: 1, total: 1 });
    }

    #[tokio::test]
    async fn execution_failures_without_reports_skip_lookup() {
        let run = Run::new("run-1")
            .with_result("tc1", RunResult::new("", RunStatus::Failed))
            .with_result("tc2", RunResult::new("", RunStatus::Cancelled));
        let (store, reconciler) = setup(run.clone(), vec![]);
        let stats = reconciler.compute(&run).await;
        assert_eq!(stats, RunStats { passed: 0, failed: 2, pending: 0, total: 2 });
        assert_eq!(store.lookup_calls(), 0);
    }

    #[tokio::test]
    async fn status_only_branch_treats_unfinished_as_pending() {
        let run = Run::new("run-1")
            .with_result("tc1", RunResult::new("", RunStatus::Completed))
            .with_result("tc2", RunResult::new("", RunStatus::Running))
            .with_result("tc3", RunResult::new("", RunStatus::Pending))
            .with_result("tc4", RunResult::new("", RunStatus::Failed));
        let (_, reconciler) = setup(run.clone(), vec![]);
        assert_eq!(reconciler.compute(&run).await, RunStats::new(0, 1, 3));
    }

    #[tokio::test]
    async fn reports_are_fetched_in_one_batch() {
        let run = Run::new("run-1")
            .with_result("tc1", completed("report1"))
            .with_result("tc2", completed("report2"))
            .with_result("tc3", completed("report1"))
            .with_result("tc4", RunResult::new("report3", RunStatus::Running));
        let (store, reconciler) = setup(run.clone(), vec![ready("report1", PassFailStatus::Passed)]);
        let stats = reconciler.compute(&run).await;
        assert_eq!(store.lookup_calls(), 1);
        assert_eq!(stats, RunStats::new(2, 0, 2));
    }

    #[tokio::test]
    async fn lookup_failure_falls_back_to_status_only() {
        let run = two_case_run().with_result("tc3", RunResult::new("", RunStatus::Failed));
        let (store, reconciler) = setup(
            run.clone(),
            vec![
                ready("report1", PassFailStatus::Passed),
                ready("report2", PassFailStatus::Passed),
            ],
        );
        store.set_fail_lookups(true);
        let stats = reconciler.compute(&run).await;
        assert_eq!(stats, RunStats::new(0, 1, 2));
    }

    #[tokio::test]
    async fn compute_is_idempotent() {
        let (_, reconciler) = setup(
            two_case_run(),
            vec![
                ready("report1", PassFailStatus::Passed),
                ready("report2", PassFailStatus::Unknown),
            ],
        );
        let first = reconciler.compute(&two_case_run()).await;
        let second = reconciler.compute(&two_case_run()).await;
        assert_eq!(first, second);
        assert_eq!(first, RunStats::new(1, 1, 0));
    }

    #[tokio::test]
    async fn read_heals_stale_stats_once() {
        let mut run = two_case_run();
        run.stats = Some(RunStats::new(0, 0, 2));
        let (store, reconciler) = setup(
            run,
            vec![
                ready("report1", PassFailStatus::Passed),
                ready("report2", PassFailStatus::Failed),
            ],
        );

        let healed = reconciler.read_run("b1", "run-1").await.unwrap();
        assert_eq!(healed.stats, Some(RunStats::new(1, 1, 0)));
        assert_eq!(store.write_calls(), 1);

        let stored = store.get_run("b1", "run-1").await.unwrap().unwrap();
        assert_eq!(stored.stats, Some(RunStats::new(1, 1, 0)));

        // Unchanged evidence: no second corrective write.
        reconciler.read_run("b1", "run-1").await.unwrap();
        assert_eq!(store.write_calls(), 1);
    }

    #[tokio::test]
    async fn update_then_read_does_not_rewrite() {
        let (store, reconciler) = setup(two_case_run(), vec![ready("report1", PassFailStatus::Passed)]);
        store
            .update_run_stats("b1", "run-1", RunStats::new(1, 0, 1))
            .await
            .unwrap();
        let writes = store.write_calls();
        let run = reconciler.read_run("b1", "run-1").await.unwrap();
        assert_eq!(run.stats, Some(RunStats::new(1, 0, 1)));
        assert_eq!(store.write_calls(), writes);
    }

    #[tokio::test]
    async fn failed_write_still_returns_fresh_stats() {
        let (store, reconciler) = setup(two_case_run(), vec![ready("report1", PassFailStatus::Passed)]);
        store.set_fail_writes(true);

        let run = reconciler.read_run("b1", "run-1").await.unwrap();
        assert_eq!(run.stats, Some(RunStats::new(1, 0, 1)));

        let outcome = reconciler.refresh_run("b1", "run-1").await.unwrap();
        assert!(!outcome.persisted);
        assert_eq!(outcome.stats, RunStats::new(1, 0, 1));

        store.set_fail_writes(false);
        let stored = store.get_run("b1", "run-1").await.unwrap().unwrap();
        assert_eq!(stored.stats, None, "failed writes must not touch persisted stats");
    }

    #[tokio::test]
    async fn refresh_writes_unconditionally() {
        let (store, reconciler) = setup(two_case_run(), vec![]);
        let first = reconciler.refresh_run("b1", "run-1").await.unwrap();
        assert!(first.changed && first.persisted);
        let second = reconciler.refresh_run("b1", "run-1").await.unwrap();
        assert!(!second.changed && second.persisted);
        assert_eq!(store.write_calls(), 2);
    }

    #[tokio::test]
    async fn refresh_benchmark_covers_every_run() {
        let (store, reconciler) = setup(two_case_run(), vec![ready("report1", PassFailStatus::Passed)]);
        let mut bench = store.get_benchmark("b1").await.unwrap().unwrap();
        bench.runs.push(
            Run::new("run-2").with_result("tc1", RunResult::new("", RunStatus::Cancelled)),
        );
        store.put_benchmark(bench);

        let outcomes = reconciler.refresh_benchmark("b1").await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].stats, RunStats::new(1, 0, 1));
        assert_eq!(outcomes[1].stats, RunStats::new(0, 1, 0));

        let read = reconciler.read_benchmark("b1").await.unwrap();
        assert!(read.runs.iter().all(|r| r.stats.is_some()));
        assert_eq!(store.write_calls(), 2);
    }

    #[tokio::test]
    async fn report_transition_heals_owning_run() {
        let pending = Report::new("report2")
            .with_pass_fail(PassFailStatus::Passed)
            .with_metrics(MetricsStatus::Calculating);
        let (store, reconciler) = setup(
            two_case_run(),
            vec![ready("report1", PassFailStatus::Passed), pending],
        );
        reconciler.read_run("b1", "run-1").await.unwrap();
        assert_eq!(
            store.get_run("b1", "run-1").await.unwrap().unwrap().stats,
            Some(RunStats::new(1, 0, 1))
        );

        // Still calculating → nothing to do.
        let skipped = reconciler
            .on_report_metrics_changed("b1", "report2", Some(MetricsStatus::Pending), Some(MetricsStatus::Calculating))
            .await
            .unwrap();
        assert!(skipped.is_none());

        store.put_report(ready("report2", PassFailStatus::Passed));
        let outcome = reconciler
            .on_report_metrics_changed("b1", "report2", Some(MetricsStatus::Calculating), Some(MetricsStatus::Ready))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.run_id, "run-1");
        assert_eq!(outcome.stats, RunStats::new(2, 0, 0));
        assert!(outcome.changed);

        let unrelated = reconciler
            .on_report_metrics_changed("b1", "report9", Some(MetricsStatus::Pending), Some(MetricsStatus::Ready))
            .await
            .unwrap();
        assert!(unrelated.is_none());
    }

    #[tokio::test]
    async fn unknown_run_is_not_found() {
        let (_, reconciler) = setup(two_case_run(), vec![]);
        assert!(matches!(
            reconciler.read_run("b1", "nope").await,
            Err(StatsError::NotFound(_))
        ));
        assert!(matches!(
            reconciler.refresh_benchmark("nope").await,
            Err(StatsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn patch_validates_and_writes() {
        let (store, reconciler) = setup(two_case_run(), vec![]);
        let stats = reconciler
            .patch_stats(
                "b1",
                "run-1",
                &serde_json::json!({"passed": 1, "failed": 1, "pending": 0, "total": 2}),
            )
            .await
            .unwrap();
        assert_eq!(stats, RunStats::new(1, 1, 0));
        assert_eq!(store.write_calls(), 1);

        let rejected = reconciler
            .patch_stats("b1", "run-1", &serde_json::json!({"passed": 1}))
            .await;
        assert!(matches!(rejected, Err(StatsError::Validation(_))));
        assert_eq!(store.write_calls(), 1);
    }

    #[tokio::test]
    async fn patch_rejects_sample_benchmarks() {
        let store = Arc::new(MemoryStore::new());
        store.put_benchmark(Benchmark {
            id: "demo".into(),
            name: "Demo".into(),
            runs: vec![two_case_run()],
            is_sample: true,
        });
        let reconciler = RunStatsReconciler::new(store.clone(), store.clone());
        let result = reconciler
            .patch_stats(
                "demo",
                "run-1",
                &serde_json::json!({"passed": 2, "failed": 0, "pending": 0, "total": 2}),
            )
            .await;
        assert!(matches!(result, Err(StatsError::Validation(_))));
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_reads_agree() {
        let mut run = two_case_run();
        run.stats = Some(RunStats::new(0, 0, 2));
        let (store, reconciler) = setup(
            run,
            vec![
                ready("report1", PassFailStatus::Passed),
                ready("report2", PassFailStatus::Passed),
            ],
        );
        let (a, b) = tokio::join!(
            reconciler.read_run("b1", "run-1"),
            reconciler.read_run("b1", "run-1")
        );
        assert_eq!(a.unwrap().stats, b.unwrap().stats);
        assert_eq!(
            store.get_run("b1", "run-1").await.unwrap().unwrap().stats,
            Some(RunStats::new(2, 0, 0))
        );
    }
}
