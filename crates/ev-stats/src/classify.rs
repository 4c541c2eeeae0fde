//! Per-result classification as an explicit decision table over
//! `(result.status, report evidence)`.
//!
//! | status              | evidence                          | outcome |
//! |---------------------|-----------------------------------|---------|
//! | pending / running   | any                               | pending |
//! | failed / cancelled  | any                               | failed  |
//! | completed           | not consulted                     | pending |
//! | completed           | no report id                      | pending |
//! | completed           | report missing                    | pending |
//! | completed           | metrics pending / calculating     | pending |
//! | completed           | pass/fail = passed                | passed  |
//! | completed           | pass/fail anything else or absent | failed  |

use ev_core::run::{PassFailStatus, Report, RunStats, RunStatus};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    Pending,
}

/// What is known about the report behind one result.
#[derive(Debug, Clone, Copy)]
pub enum ReportEvidence<'a> {
    /// Reports were not fetched (no ids in the run, or the store failed).
    NotConsulted,
    /// The result carries no report id.
    NoReport,
    /// The id is set but the store did not return it yet.
    Missing,
    Found(&'a Report),
}

pub fn classify(status: RunStatus, evidence: ReportEvidence<'_>) -> Outcome {
    match (status, evidence) {
        (RunStatus::Pending | RunStatus::Running, _) => Outcome::Pending,
        (RunStatus::Failed | RunStatus::Cancelled, _) => Outcome::Failed,
        (
            RunStatus::Completed,
            ReportEvidence::NotConsulted | ReportEvidence::NoReport | ReportEvidence::Missing,
        ) => Outcome::Pending,
        (RunStatus::Completed, ReportEvidence::Found(report)) => judge(report),
    }
}

fn judge(report: &Report) -> Outcome {
    if report.metrics_status.is_some_and(|m| m.is_awaiting()) {
        return Outcome::Pending;
    }
    match report.pass_fail_status {
        Some(PassFailStatus::Passed) => Outcome::Passed,
        // Evaluated but not passing is definitive, including legacy values.
        _ => Outcome::Failed,
    }
}

pub fn tally<I: IntoIterator<Item = Outcome>>(outcomes: I) -> RunStats {
    let mut stats = RunStats::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Passed => stats.passed += 1,
            Outcome::Failed => stats.failed += 1,
            Outcome::Pending => stats.pending += 1,
        }
        stats.total += 1;
    }
    stats
}
