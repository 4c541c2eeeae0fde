//! SQLite persistence for benchmarks and reports.
//!
//! Benchmarks are stored as whole JSON documents, mirroring how they are
//! exchanged; a stats update rewrites the owning document in a transaction.

use crate::store::{ReportLookup, RunStore};
use crate::StoreError;
use async_trait::async_trait;
use ev_core::run::{Benchmark, Report, RunStats};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Ids per `IN (..)` query, below SQLite's bound-parameter limit.
const LOOKUP_BATCH: usize = 500;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the evaluation database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS benchmarks (
                id TEXT PRIMARY KEY,
                doc_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reports (
                id TEXT PRIMARY KEY,
                doc_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn put_benchmark(&self, benchmark: &Benchmark) -> Result<(), StoreError> {
        let conn = self.lock()?;
        upsert(&conn, "benchmarks", &benchmark.id, benchmark)
    }

    pub fn put_report(&self, report: &Report) -> Result<(), StoreError> {
        let conn = self.lock()?;
        upsert(&conn, "reports", &report.id, report)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

fn upsert<T: serde::Serialize>(
    conn: &Connection,
    table: &str,
    id: &str,
    doc: &T,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(doc).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    conn.execute(
        &format!(
            "INSERT INTO {table} (id, doc_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET doc_json = excluded.doc_json,
                                           updated_at = excluded.updated_at"
        ),
        rusqlite::params![id, json, chrono::Utc::now().to_rfc3339()],
    )
    .map_err(|e| StoreError::Database(e.to_string()))?;
    Ok(())
}

fn load_benchmark(conn: &Connection, benchmark_id: &str) -> Result<Option<Benchmark>, StoreError> {
    let json: Option<String> = conn
        .query_row(
            "SELECT doc_json FROM benchmarks WHERE id = ?1",
            rusqlite::params![benchmark_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))?;
    json.map(|j| {
        serde_json::from_str(&j)
            .map_err(|e| StoreError::Corrupt(format!("benchmark {benchmark_id}: {e}")))
    })
    .transpose()
}

fn fetch_reports(
    conn: &Connection,
    ids: &[String],
    into: &mut HashMap<String, Report>,
) -> Result<(), StoreError> {
    let placeholders = (1..=ids.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn
        .prepare(&format!(
            "SELECT id, doc_json FROM reports WHERE id IN ({placeholders})"
        ))
        .map_err(|e| StoreError::Database(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| StoreError::Database(e.to_string()))?;

    for row in rows {
        let (id, json) = row.map_err(|e| StoreError::Database(e.to_string()))?;
        match serde_json::from_str::<Report>(&json) {
            Ok(report) => {
                into.insert(id, report);
            }
            // Treated as not yet available.
            Err(e) => tracing::warn!(report_id = %id, error = %e, "skipping unreadable report"),
        }
    }
    Ok(())
}

#[async_trait]
impl ReportLookup for SqliteStore {
    async fn get_reports(
        &self,
        report_ids: &[String],
    ) -> Result<HashMap<String, Report>, StoreError> {
        if report_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.lock()?;
        let mut reports = HashMap::new();
        for batch in report_ids.chunks(LOOKUP_BATCH) {
            fetch_reports(&conn, batch, &mut reports)?;
        }
        Ok(reports)
    }
}

#[async_trait]
impl RunStore for SqliteStore {
    async fn get_benchmark(&self, benchmark_id: &str) -> Result<Option<Benchmark>, StoreError> {
        let conn = self.lock()?;
        load_benchmark(&conn, benchmark_id)
    }

    async fn update_run_stats(
        &self,
        benchmark_id: &str,
        run_id: &str,
        stats: RunStats,
    ) -> Result<bool, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let Some(mut benchmark) = load_benchmark(&tx, benchmark_id)? else {
            return Ok(false);
        };
        let Some(run) = benchmark.find_run_mut(run_id) else {
            return Ok(false);
        };
        run.stats = Some(stats);
        upsert(&tx, "benchmarks", benchmark_id, &benchmark)?;

        tx.commit().map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(true)
    }
}
