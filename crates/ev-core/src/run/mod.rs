//! Run types — benchmark runs, their per-test-case results, the reports
//! judging them, and the aggregate counters derived from both.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Per-test-case execution result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Execution has not produced a final outcome yet.
    pub fn is_in_flight(self) -> bool {
        matches!(self, RunStatus::Pending | RunStatus::Running)
    }

    /// Execution itself failed, regardless of any judging.
    pub fn is_execution_failure(self) -> bool {
        matches!(self, RunStatus::Failed | RunStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// Empty when no report has been written for this test case.
    #[serde(default)]
    pub report_id: String,
    pub status: RunStatus,
}

impl RunResult {
    pub fn new(report_id: impl Into<String>, status: RunStatus) -> Self {
        Self {
            report_id: report_id.into(),
            status,
        }
    }

    pub fn report_id(&self) -> Option<&str> {
        let id = self.report_id.trim();
        (!id.is_empty()).then_some(id)
    }
}

// ---------------------------------------------------------------------------
// Run and benchmark documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Test case id → result.
    #[serde(default)]
    pub results: BTreeMap<String, RunResult>,

    /// Last persisted counters. A cache, possibly stale.
    #[serde(default)]
    pub stats: Option<RunStats>,
}

impl Run {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            results: BTreeMap::new(),
            stats: None,
        }
    }

    pub fn with_result(mut self, test_case_id: impl Into<String>, result: RunResult) -> Self {
        self.results.insert(test_case_id.into(), result);
        self
    }

    pub fn references_report(&self, report_id: &str) -> bool {
        self.results
            .values()
            .any(|r| r.report_id() == Some(report_id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Benchmark {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub runs: Vec<Run>,

    /// Bundled demo data; never written to by operators.
    #[serde(default)]
    pub is_sample: bool,
}

impl Benchmark {
    pub fn find_run(&self, run_id: &str) -> Option<&Run> {
        self.runs.iter().find(|r| r.id == run_id)
    }

    pub fn find_run_mut(&mut self, run_id: &str) -> Option<&mut Run> {
        self.runs.iter_mut().find(|r| r.id == run_id)
    }

    pub fn find_run_by_report(&self, report_id: &str) -> Option<&Run> {
        self.runs.iter().find(|r| r.references_report(report_id))
    }
}

// ---------------------------------------------------------------------------
// Report: judged outcome of one test case, owned by the persistence layer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PassFailStatus {
    Passed,
    Failed,
    /// Legacy or unrecognised values.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricsStatus {
    Pending,
    Calculating,
    Ready,
    #[serde(other)]
    Unknown,
}

impl MetricsStatus {
    /// Judging still depends on trace evidence that has not been scored.
    pub fn is_awaiting(self) -> bool {
        matches!(self, MetricsStatus::Pending | MetricsStatus::Calculating)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,

    #[serde(default)]
    pub pass_fail_status: Option<PassFailStatus>,

    /// Only present on trace-mode reports.
    #[serde(default)]
    pub metrics_status: Option<MetricsStatus>,
}

impl Report {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pass_fail_status: None,
            metrics_status: None,
        }
    }

    pub fn with_pass_fail(mut self, status: PassFailStatus) -> Self {
        self.pass_fail_status = Some(status);
        self
    }

    pub fn with_metrics(mut self, status: MetricsStatus) -> Self {
        self.metrics_status = Some(status);
        self
    }
}

// ---------------------------------------------------------------------------
// Aggregate counters
// ---------------------------------------------------------------------------

/// `passed + failed + pending == total == |results|`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RunStats {
    pub passed: u32,
    pub failed: u32,
    pub pending: u32,
    pub total: u32,
}

impl RunStats {
    pub fn new(passed: u32, failed: u32, pending: u32) -> Self {
        Self {
            passed,
            failed,
            pending,
            // Saturates; a saturated total never passes `is_consistent`.
            total: passed.saturating_add(failed).saturating_add(pending),
        }
    }

    /// `passed + failed + pending == total`, without wrapping.
    pub fn is_consistent(&self) -> bool {
        self.passed
            .checked_add(self.failed)
            .and_then(|sum| sum.checked_add(self.pending))
            == Some(self.total)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_report_id_is_absent() {
        assert_eq!(RunResult::new("", RunStatus::Completed).report_id(), None);
        assert_eq!(RunResult::new("  ", RunStatus::Completed).report_id(), None);
        assert_eq!(
            RunResult::new("r1", RunStatus::Completed).report_id(),
            Some("r1")
        );
    }

    #[test]
    fn unknown_pass_fail_value_is_tolerated() {
        let report: Report = serde_json::from_value(serde_json::json!({
            "id": "r1",
            "passFailStatus": "partially_passed",
            "metricsStatus": "ready"
        }))
        .unwrap();
        assert_eq!(report.pass_fail_status, Some(PassFailStatus::Unknown));
        assert_eq!(report.metrics_status, Some(MetricsStatus::Ready));
    }

    #[test]
    fn find_run_by_report_scans_results() {
        let bench = Benchmark {
            id: "b1".into(),
            name: "smoke".into(),
            runs: vec![
                Run::new("run-a").with_result("tc1", RunResult::new("r1", RunStatus::Completed)),
                Run::new("run-b").with_result("tc1", RunResult::new("r2", RunStatus::Completed)),
            ],
            is_sample: false,
        };
        assert_eq!(bench.find_run_by_report("r2").map(|r| r.id.as_str()), Some("run-b"));
        assert!(bench.find_run_by_report("r3").is_none());
    }

    #[test]
    fn stats_constructor_keeps_total_consistent() {
        let stats = RunStats::new(2, 1, 3);
        assert_eq!(stats.total, 6);
        assert!(stats.is_consistent());
    }

    #[test]
    fn overflowing_counters_are_inconsistent() {
        let wrapped = RunStats {
            passed: u32::MAX,
            failed: 1,
            pending: 0,
            total: 0,
        };
        assert!(!wrapped.is_consistent());
        assert!(!RunStats::new(u32::MAX, 1, 0).is_consistent());
    }
}
