//! Application state shared by all commands.

use anyhow::Context;
use ev_core::config::TelemetryConfig;
use ev_runner::Orchestrator;
use ev_stats::sqlite::SqliteStore;
use ev_trace::store::SpanStore;
use std::sync::Arc;

pub struct AppState {
    pub orchestrator: Orchestrator,
    /// Benchmarks and reports. Also reachable through the orchestrator's
    /// trait objects; kept concrete for document writes.
    pub evals: Arc<SqliteStore>,
}

impl AppState {
    /// Open the span and evaluation databases under the configured data dir.
    pub fn open(config: TelemetryConfig) -> anyhow::Result<Self> {
        let data_dir = &config.storage.data_dir;
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("creating data dir {}", data_dir.display()))?;

        let spans_path = config.storage.spans_db();
        let spans = SpanStore::open(&spans_path)
            .with_context(|| format!("opening span store {}", spans_path.display()))?;
        let evals_path = config.storage.evals_db();
        let evals = Arc::new(
            SqliteStore::open(&evals_path)
                .with_context(|| format!("opening evaluation store {}", evals_path.display()))?,
        );
        tracing::debug!(data_dir = %data_dir.display(), "stores opened");

        let orchestrator =
            Orchestrator::new(config, Arc::new(spans), evals.clone(), evals.clone())?;
        Ok(Self {
            orchestrator,
            evals,
        })
    }
}
