//! Response-time statistics.

use crate::db::ProbeRecord;

use serde::Serialize;

/// Check counts and response-time distribution.
///
/// Counts cover every record; time fields cover successful records only.
/// All zero when nothing qualifies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub total_checks: u64,
    pub successful_checks: u64,
    pub failed_checks: u64,
    pub avg_response_time: f64,
    pub min_response_time: f64,
    pub max_response_time: f64,
    pub median_response_time: f64,
    pub p95_response_time: f64,
}

pub fn performance_stats(records: &[ProbeRecord]) -> PerformanceStats {
    let mut times: Vec<f64> = records.iter().filter_map(ProbeRecord::response_time).collect();

    let total_checks = records.len() as u64;
    let successful_checks = times.len() as u64;
    let mut stats = PerformanceStats {
        total_checks,
        successful_checks,
        failed_checks: total_checks - successful_checks,
        ..Default::default()
    };

    if times.is_empty() {
        return stats;
    }

    times.sort_by(f64::total_cmp);

    stats.avg_response_time = times.iter().sum::<f64>() / times.len() as f64;
    stats.min_response_time = times[0];
    stats.max_response_time = times[times.len() - 1];
    stats.median_response_time = median(&times);
    stats.p95_response_time = percentile(&times, 95.0);
    stats
}

/// Median of an ascending slice; mean of the middle pair for even lengths.
pub fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }

    let mid = n / 2;
    if n % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Nearest-rank percentile of an ascending slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
