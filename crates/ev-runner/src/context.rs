//! Run context — what one agent run produced on the wire.

use chrono::{DateTime, Utc};
use ev_core::event::{AgUiEvent, EventKind};
use ev_stream::CompletionReason;
use serde::Serialize;
use uuid::Uuid;

/// The raw event trajectory of one executed run, in delivery order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    pub execution_id: Uuid,
    pub benchmark_id: String,
    pub run_id: String,
    pub endpoint: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Connection attempts made, including the successful one.
    pub attempts: u32,
    pub events: Vec<AgUiEvent>,
    pub completion: Option<CompletionReason>,
}

impl RunContext {
    pub fn new(benchmark_id: &str, run_id: &str, endpoint: &str) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            benchmark_id: benchmark_id.to_string(),
            run_id: run_id.to_string(),
            endpoint: endpoint.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            attempts: 0,
            events: Vec::new(),
            completion: None,
        }
    }

    pub fn finish(&mut self, reason: CompletionReason) {
        self.finished_at = Some(Utc::now());
        self.completion = Some(reason);
    }

    /// The agent itself declared the run over.
    pub fn ended_by_agent(&self) -> bool {
        matches!(self.completion, Some(CompletionReason::Event(_)))
    }

    pub fn count_of(&self, kind: &EventKind) -> usize {
        self.events.iter().filter(|e| &e.kind == kind).count()
    }
}
