//! Uptime percentages.

use crate::db::ProbeRecord;

use serde::Serialize;

/// Uptime over the four canonical windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UptimeSummary {
    pub overall: f64,
    pub last_24h: f64,
    pub last_7d: f64,
    pub last_30d: f64,
}

/// Percentage of successful records, rounded to two decimals.
///
/// An empty slice yields `0.0`.
pub fn uptime_percentage(records: &[ProbeRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }

    let successful = records.iter().filter(|r| r.success()).count();
    round2(successful as f64 / records.len() as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
