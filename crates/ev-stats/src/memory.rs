//! In-memory store implementing both collaborator traits.
//!
//! Backs the CLI when no database is configured and the reconciler tests.
//! Call counters and failure switches let callers observe round trips.

use crate::store::{ReportLookup, RunStore};
use crate::StoreError;
use async_trait::async_trait;
use ev_core::run::{Benchmark, Report, RunStats};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

#[derive(Default)]
pub struct MemoryStore {
    benchmarks: RwLock<HashMap<String, Benchmark>>,
    reports: RwLock<HashMap<String, Report>>,
    lookups: AtomicUsize,
    writes: AtomicUsize,
    fail_lookups: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a benchmark document.
    pub fn put_benchmark(&self, benchmark: Benchmark) {
        self.benchmarks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(benchmark.id.clone(), benchmark);
    }

    pub fn put_report(&self, report: Report) {
        self.reports
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(report.id.clone(), report);
    }

    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `get_reports` calls so far.
    pub fn lookup_calls(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of successful `update_run_stats` calls so far.
    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportLookup for MemoryStore {
    async fn get_reports(
        &self,
        report_ids: &[String],
    ) -> Result<HashMap<String, Report>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("report store offline".into()));
        }
        let reports = self
            .reports
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(report_ids
            .iter()
            .filter_map(|id| reports.get(id).map(|r| (id.clone(), r.clone())))
            .collect())
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn get_benchmark(&self, benchmark_id: &str) -> Result<Option<Benchmark>, StoreError> {
        let benchmarks = self
            .benchmarks
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(benchmarks.get(benchmark_id).cloned())
    }

    async fn update_run_stats(
        &self,
        benchmark_id: &str,
        run_id: &str,
        stats: RunStats,
    ) -> Result<bool, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("benchmark store read-only".into()));
        }
        let mut benchmarks = self
            .benchmarks
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let Some(run) = benchmarks
            .get_mut(benchmark_id)
            .and_then(|b| b.find_run_mut(run_id))
        else {
            return Ok(false);
        };
        run.stats = Some(stats);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ev_core::run::Run;

    #[tokio::test]
    async fn lookup_returns_only_known_ids() {
        let store = MemoryStore::new();
        store.put_report(Report::new("r1"));
        let found = store
            .get_reports(&["r1".into(), "r2".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("r1"));
        assert_eq!(store.lookup_calls(), 1);
    }

    #[tokio::test]
    async fn update_missing_run_reports_false() {
        let store = MemoryStore::new();
        store.put_benchmark(Benchmark {
            id: "b1".into(),
            name: String::new(),
            runs: vec![Run::new("run-1")],
            is_sample: false,
        });
        assert!(!store.update_run_stats("b1", "run-9", RunStats::default()).await.unwrap());
        assert!(!store.update_run_stats("b9", "run-1", RunStats::default()).await.unwrap());
        assert!(store.update_run_stats("b1", "run-1", RunStats::new(1, 0, 0)).await.unwrap());
        assert_eq!(store.write_calls(), 1);
    }

    #[tokio::test]
    async fn failure_switches() {
        let store = MemoryStore::new();
        store.set_fail_lookups(true);
        store.set_fail_writes(true);
        assert!(store.get_reports(&[]).await.is_err());
        assert!(store.update_run_stats("b", "r", RunStats::default()).await.is_err());
    }
}
