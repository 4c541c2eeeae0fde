//! SQLite-backed span store.

use crate::TraceError;
use chrono::{DateTime, Utc};
use ev_core::trace::{Span, SpanStatus, RUN_ID_ATTR};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

const SELECT_COLUMNS: &str = "SELECT span_id, trace_id, parent_span_id, name,
        start_time, end_time, status, attributes_json, events_json
     FROM spans";

/// Span store backed by a single SQLite database.
/// Uses Mutex<Connection> for thread safety (rusqlite::Connection is !Sync).
pub struct SpanStore {
    conn: Mutex<Connection>,
}

impl SpanStore {
    /// Open (or create) the span database at the given path.
    pub fn open(path: &Path) -> Result<Self, TraceError> {
        let conn = Connection::open(path).map_err(|e| TraceError::Database(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory span store (useful for testing).
    pub fn in_memory() -> Result<Self, TraceError> {
        let conn =
            Connection::open_in_memory().map_err(|e| TraceError::Database(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), TraceError> {
        let conn = self.conn.lock().map_err(|e| TraceError::Database(e.to_string()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS spans (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                span_id TEXT NOT NULL,
                trace_id TEXT NOT NULL,
                parent_span_id TEXT,
                name TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                status TEXT NOT NULL,
                attributes_json TEXT NOT NULL,
                events_json TEXT,
                run_id TEXT,
                UNIQUE (trace_id, span_id)
            );

            CREATE INDEX IF NOT EXISTS idx_spans_trace
                ON spans(trace_id);
            CREATE INDEX IF NOT EXISTS idx_spans_run
                ON spans(run_id);",
        )
        .map_err(|e| TraceError::Database(e.to_string()))?;
        Ok(())
    }

    /// Insert a span. Returns `false` if it was already stored.
    pub fn insert_span(&self, span: &Span) -> Result<bool, TraceError> {
        let conn = self.conn.lock().map_err(|e| TraceError::Database(e.to_string()))?;
        insert(&conn, span)
    }

    /// Insert many spans in one transaction. Returns how many were new.
    pub fn insert_spans(&self, spans: &[Span]) -> Result<usize, TraceError> {
        let mut conn = self.conn.lock().map_err(|e| TraceError::Database(e.to_string()))?;
        let tx = conn
            .transaction()
            .map_err(|e| TraceError::Database(e.to_string()))?;
        let mut inserted = 0;
        for span in spans {
            if insert(&tx, span)? {
                inserted += 1;
            }
        }
        tx.commit().map_err(|e| TraceError::Database(e.to_string()))?;
        tracing::debug!(received = spans.len(), inserted, "spans ingested");
        Ok(inserted)
    }

    /// All spans of one trace, in ingestion order.
    pub fn spans_for_trace(&self, trace_id: &str) -> Result<Vec<Span>, TraceError> {
        let conn = self.conn.lock().map_err(|e| TraceError::Database(e.to_string()))?;
        let sql = format!("{SELECT_COLUMNS} WHERE trace_id = ?1 ORDER BY seq ASC");
        query(&conn, &sql, rusqlite::params![trace_id])
    }

    /// All spans tagged with any of `run_ids`, in ingestion order.
    pub fn spans_for_runs(&self, run_ids: &[String]) -> Result<Vec<Span>, TraceError> {
        if run_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().map_err(|e| TraceError::Database(e.to_string()))?;
        let sql = format!(
            "{SELECT_COLUMNS} WHERE run_id IN ({}) ORDER BY seq ASC",
            placeholders(run_ids.len())
        );
        query(&conn, &sql, rusqlite::params_from_iter(run_ids.iter()))
    }

    pub fn count_for_runs(&self, run_ids: &[String]) -> Result<usize, TraceError> {
        if run_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().map_err(|e| TraceError::Database(e.to_string()))?;
        let sql = format!(
            "SELECT COUNT(*) FROM spans WHERE run_id IN ({})",
            placeholders(run_ids.len())
        );
        let count: i64 = conn
            .query_row(&sql, rusqlite::params_from_iter(run_ids.iter()), |row| row.get(0))
            .map_err(|e| TraceError::Database(e.to_string()))?;
        Ok(count as usize)
    }
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

fn insert(conn: &Connection, span: &Span) -> Result<bool, TraceError> {
    let changed = conn
        .execute(
            "INSERT OR IGNORE INTO spans (
                span_id, trace_id, parent_span_id, name,
                start_time, end_time, status,
                attributes_json, events_json, run_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                span.span_id,
                span.trace_id,
                span.parent_span_id,
                span.name,
                span.start_time.to_rfc3339(),
                span.end_time.to_rfc3339(),
                serde_json::to_string(&span.status).unwrap_or_default(),
                serde_json::Value::Object(span.attributes.clone()).to_string(),
                span.events
                    .as_ref()
                    .map(|e| serde_json::to_string(e).unwrap_or_default()),
                span.attribute_str(RUN_ID_ATTR),
            ],
        )
        .map_err(|e| TraceError::Database(e.to_string()))?;
    Ok(changed > 0)
}

fn query<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Span>, TraceError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| TraceError::Database(e.to_string()))?;
    let rows = stmt
        .query_map(params, |row| {
            Ok(RawSpanRow {
                span_id: row.get(0)?,
                trace_id: row.get(1)?,
                parent_span_id: row.get(2)?,
                name: row.get(3)?,
                start_time: row.get(4)?,
                end_time: row.get(5)?,
                status: row.get(6)?,
                attributes_json: row.get(7)?,
                events_json: row.get(8)?,
            })
        })
        .map_err(|e| TraceError::Database(e.to_string()))?;

    let mut spans = Vec::new();
    for row in rows {
        let raw = row.map_err(|e| TraceError::Database(e.to_string()))?;
        spans.push(raw_to_span(raw)?);
    }
    Ok(spans)
}

/// Internal row struct for SQLite queries.
struct RawSpanRow {
    span_id: String,
    trace_id: String,
    parent_span_id: Option<String>,
    name: String,
    start_time: String,
    end_time: String,
    status: String,
    attributes_json: String,
    events_json: Option<String>,
}

fn raw_to_span(raw: RawSpanRow) -> Result<Span, TraceError> {
    let parse_err = |field: &str, e: String| TraceError::Database(format!("{field}: {e}"));
    let parse_time = |field: &str, s: &str| -> Result<DateTime<Utc>, TraceError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| parse_err(field, e.to_string()))
    };

    Ok(Span {
        start_time: parse_time("start_time", &raw.start_time)?,
        end_time: parse_time("end_time", &raw.end_time)?,
        span_id: raw.span_id,
        trace_id: raw.trace_id,
        parent_span_id: raw.parent_span_id,
        name: raw.name,
        status: serde_json::from_str(&raw.status).unwrap_or(SpanStatus::Unset),
        attributes: serde_json::from_str(&raw.attributes_json)
            .map_err(|e| parse_err("attributes_json", e.to_string()))?,
        events: raw
            .events_json
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| parse_err("events_json", e.to_string()))?,
    })
}
