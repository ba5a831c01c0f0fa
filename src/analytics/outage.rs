//! Outage reconstruction from an ordered record stream.

use crate::db::ProbeRecord;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A maximal run of consecutive failed records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutagePeriod {
    /// Timestamp of the first failure in the run.
    pub start: DateTime<Utc>,
    /// Timestamp of the last failure in the run.
    pub end: DateTime<Utc>,
    pub failed_count: u64,
    /// `end - start` in whole minutes.
    pub duration_minutes: i64,
    /// No success followed the run within the queried records.
    pub ongoing: bool,
}

/// Aggregate view over a list of outages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutageSummary {
    pub total_outages: usize,
    pub total_downtime_minutes: i64,
    pub longest_outage_minutes: i64,
    pub outages: Vec<OutagePeriod>,
}

impl From<Vec<OutagePeriod>> for OutageSummary {
    fn from(outages: Vec<OutagePeriod>) -> Self {
        Self {
            total_outages: outages.len(),
            total_downtime_minutes: outages.iter().map(|o| o.duration_minutes).sum(),
            longest_outage_minutes: outages
                .iter()
                .map(|o| o.duration_minutes)
                .max()
                .unwrap_or(0),
            outages,
        }
    }
}

/// Outage being accumulated during the scan.
struct OpenOutage {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    failed_count: u64,
}

impl OpenOutage {
    fn close(self, ongoing: bool) -> OutagePeriod {
        OutagePeriod {
            start: self.start,
            end: self.end,
            failed_count: self.failed_count,
            duration_minutes: (self.end - self.start).num_minutes(),
            ongoing,
        }
    }
}

/// Find outages in records sorted by ascending timestamp. Single pass.
///
/// A lone failure forms a zero-minute outage.
pub fn detect_outages(records: &[ProbeRecord]) -> Vec<OutagePeriod> {
    let mut outages = Vec::new();
    let mut open: Option<OpenOutage> = None;

    for record in records {
        if record.success() {
            if let Some(outage) = open.take() {
                outages.push(outage.close(false));
            }
            continue;
        }

        match open.as_mut() {
            Some(outage) => {
                outage.end = record.timestamp;
                outage.failed_count += 1;
            }
            None => {
                open = Some(OpenOutage {
                    start: record.timestamp,
                    end: record.timestamp,
                    failed_count: 1,
                });
            }
        }
    }

    if let Some(outage) = open {
        outages.push(outage.close(true));
    }

    outages
}
