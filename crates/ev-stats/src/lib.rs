//! ev-stats: derive and repair aggregate run statistics from per-test-case
//! results and the reports judging them.

pub mod classify;
pub mod memory;
pub mod patch;
pub mod reconciler;
pub mod sqlite;
pub mod store;

pub use classify::{classify, Outcome, ReportEvidence};
pub use reconciler::{compute_stats, RefreshOutcome, RunStatsReconciler};
pub use store::{ReportLookup, RunStore};

use thiserror::Error;

/// Failures reported by storage collaborators.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("corrupt document: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("lookup failed: {0}")]
    Lookup(#[from] StoreError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("failed to persist stats: {0}")]
    Persistence(String),
    #[error("invalid stats patch: {0}")]
    Validation(String),
}
