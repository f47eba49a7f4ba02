//! Derived display metrics.
//!
//! Pure functions over the current run/report snapshot; no hidden state, so
//! they are recomputed on every read. Cheap enough that callers never cache
//! the results.

use serde::Serialize;

use crate::model::{RunRecord, RunStatus};

/// Headline counters for the dashboard cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTotals {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
}

/// Count runs by terminal status.
pub fn run_totals(runs: &[RunRecord]) -> RunTotals {
    let mut totals = RunTotals {
        total: runs.len() as u64,
        ..RunTotals::default()
    };
    for run in runs {
        match run.status {
            RunStatus::Pass => totals.passed += 1,
            RunStatus::Fail => totals.failed += 1,
            _ => {}
        }
    }
    totals
}

/// Percentage of runs with status PASS, rounded to the nearest integer.
/// 0 for an empty slice, never a division by zero.
pub fn pass_rate(runs: &[RunRecord]) -> u32 {
    if runs.is_empty() {
        return 0;
    }
    let passed = runs
        .iter()
        .filter(|run| run.status == RunStatus::Pass)
        .count();
    (100.0 * passed as f64 / runs.len() as f64).round() as u32
}

/// Run with the lexicographically greatest `started_at` string.
///
/// String comparison is intentional: the backend emits ISO-8601, for which
/// lexicographic order equals chronological order, and it sidesteps parse
/// failures. Runs without a timestamp compare as the empty string.
pub fn latest_run(runs: &[RunRecord]) -> Option<&RunRecord> {
    runs.iter().max_by(|a, b| {
        let key_a = a.started_at.as_deref().unwrap_or("");
        let key_b = b.started_at.as_deref().unwrap_or("");
        key_a.cmp(key_b)
    })
}

/// `clamp(round(100 * value / total), 0, 100)`; 0 when `total` is 0 or not
/// a meaningful denominator.
pub fn coverage_percent(value: f64, total: f64) -> u8 {
    if total <= 0.0 || !total.is_finite() || !value.is_finite() {
        return 0;
    }
    (100.0 * value / total).round().clamp(0.0, 100.0) as u8
}
