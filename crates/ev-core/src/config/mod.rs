//! Configuration — one JSON document, every section optional.

use crate::trace::LatencyEdge;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub stream: StreamConfig,
    pub trace: TraceConfig,
    pub runner: RunnerConfig,
    pub storage: StorageConfig,
}

impl TelemetryConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub idle_timeout_ms: u64,
    pub idle_check_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub complete_on_run_end: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 120_000,
            idle_check_interval_ms: 1_000,
            connect_timeout_ms: 30_000,
            complete_on_run_end: true,
        }
    }
}

impl StreamConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_millis(self.idle_check_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Trace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub latency_buckets: Vec<LatencyEdge>,
    pub cache_capacity: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            latency_buckets: LatencyEdge::standard(),
            cache_capacity: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub retry: RetryPolicy,
}

/// Backoff for reconnecting to an agent endpoint after a connection failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_backoff() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 1_000,
            backoff_multiplier: 2.0,
            max_backoff_ms: default_max_backoff(),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .map(|p| p.join("evtel"))
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl StorageConfig {
    pub fn spans_db(&self) -> PathBuf {
        self.data_dir.join("spans.db")
    }

    pub fn evals_db(&self) -> PathBuf {
        self.data_dir.join("evals.db")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = TelemetryConfig::default();
        assert_eq!(config.stream.idle_timeout(), Duration::from_secs(120));
        assert_eq!(config.stream.idle_check_interval(), Duration::from_secs(1));
        assert!(config.stream.complete_on_run_end);
        assert_eq!(config.trace.latency_buckets.len(), 6);
        assert_eq!(config.runner.retry.max_retries, 0);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config: TelemetryConfig =
            serde_json::from_str(r#"{"stream": {"idle_timeout_ms": 500}}"#).unwrap();
        assert_eq!(config.stream.idle_timeout_ms, 500);
        assert_eq!(config.stream.idle_check_interval_ms, 1_000);
        assert_eq!(config.trace.cache_capacity, 64);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = TelemetryConfig::load(Path::new("/nonexistent/evtel.json")).unwrap();
        assert_eq!(config.stream.connect_timeout_ms, 30_000);
    }
}
