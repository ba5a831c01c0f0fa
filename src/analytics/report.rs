//! The combined status report.

use super::outage::OutageSummary;
use super::performance::PerformanceStats;
use super::uptime::UptimeSummary;
use crate::db::ProbeRecord;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything a status view needs for one window and optional target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompleteReport {
    pub generated_at: DateTime<Utc>,
    /// Lookback in hours; `None` for all-time.
    pub window_hours: Option<i64>,
    pub target: Option<String>,
    pub uptime: UptimeSummary,
    pub outages: OutageSummary,
    pub performance: PerformanceStats,
    /// Latest record in the window.
    pub last_check: Option<ProbeRecord>,
}

impl CompleteReport {
    /// All-zero report, returned when no history could be read.
    pub fn empty(generated_at: DateTime<Utc>, window_hours: Option<i64>, target: Option<&str>) -> Self {
        Self {
            generated_at,
            window_hours,
            target: target.map(str::to_string),
            uptime: UptimeSummary::default(),
            outages: OutageSummary::default(),
            performance: PerformanceStats::default(),
            last_check: None,
        }
    }
}
