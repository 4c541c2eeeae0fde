//! Collaborator interfaces for the report store and the benchmark/run store.

use crate::StoreError;
use async_trait::async_trait;
use ev_core::run::{Benchmark, Report, Run, RunStats};
use std::collections::HashMap;

/// Read-only access to judged reports.
#[async_trait]
pub trait ReportLookup: Send + Sync {
    /// Fetch every report in `report_ids` in one round trip. Ids the store
    /// does not know are simply absent from the map.
    async fn get_reports(&self, report_ids: &[String])
        -> Result<HashMap<String, Report>, StoreError>;
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn get_benchmark(&self, benchmark_id: &str) -> Result<Option<Benchmark>, StoreError>;

    async fn get_run(&self, benchmark_id: &str, run_id: &str) -> Result<Option<Run>, StoreError> {
        Ok(self
            .get_benchmark(benchmark_id)
            .await?
            .and_then(|b| b.find_run(run_id).cloned()))
    }

    /// Returns `false` when the run does not exist.
    async fn update_run_stats(
        &self,
        benchmark_id: &str,
        run_id: &str,
        stats: RunStats,
    ) -> Result<bool, StoreError>;
}
