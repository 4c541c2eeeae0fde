//! Trace export — render spans, summaries or trees as JSON.

use crate::TraceError;
use serde::Serialize;

/// Export any trace view to a pretty-printed JSON string.
pub fn export_json<T: Serialize + ?Sized>(view: &T) -> Result<String, TraceError> {
    serde_json::to_string_pretty(view).map_err(|e| TraceError::Export(e.to_string()))
}
