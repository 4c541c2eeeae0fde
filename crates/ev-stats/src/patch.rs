//! Validation of operator-supplied stats overrides.

use crate::StatsError;
use ev_core::run::RunStats;
use serde_json::Value;

const FIELDS: [&str; 4] = ["passed", "failed", "pending", "total"];

/// Accept only an object carrying all four counters as non-negative integers
/// that add up.
pub fn validate_patch(patch: &Value) -> Result<RunStats, StatsError> {
    let obj = patch
        .as_object()
        .ok_or_else(|| StatsError::Validation("stats must be a JSON object".into()))?;

    let mut values = [0u32; 4];
    for (slot, field) in values.iter_mut().zip(FIELDS) {
        let raw = obj
            .get(field)
            .ok_or_else(|| StatsError::Validation(format!("missing field `{field}`")))?;
        *slot = raw
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                StatsError::Validation(format!("`{field}` must be a non-negative integer, got {raw}"))
            })?;
    }

    let [passed, failed, pending, total] = values;
    let stats = RunStats {
        passed,
        failed,
        pending,
        total,
    };
    if !stats.is_consistent() {
        return Err(StatsError::Validation(format!(
            "passed + failed + pending ({}) does not equal total ({total})",
            u64::from(passed) + u64::from(failed) + u64::from(pending)
        )));
    }
    Ok(stats)
}
