//! Analytics over probe history.
//!
//! The free functions in the submodules are pure over a record slice sorted
//! by ascending timestamp. [`Analytics`] binds them to a [`Store`], reading a
//! fresh snapshot on every call. Store failures are logged and degrade to the
//! zero-valued result.

mod outage;
mod performance;
mod report;
mod uptime;

pub use outage::*;
pub use performance::*;
pub use report::*;
pub use uptime::*;

use crate::db::{ProbeRecord, RecordFilter, Store};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;

/// Lookback window for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    AllTime,
    Last(ChronoDuration),
}

impl Window {
    pub fn hours(hours: u32) -> Self {
        Window::Last(ChronoDuration::hours(i64::from(hours)))
    }

    pub fn days(days: u32) -> Self {
        Window::Last(ChronoDuration::days(i64::from(days)))
    }

    /// Earliest included timestamp, or `None` for all-time.
    ///
    /// A lookback reaching past the earliest representable time covers the
    /// whole history, so it is treated as all-time.
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Window::AllTime => None,
            Window::Last(d) => now.checked_sub_signed(d),
        }
    }

    pub fn as_hours(self) -> Option<i64> {
        match self {
            Window::AllTime => None,
            Window::Last(d) => Some(d.num_hours()),
        }
    }
}

/// Suffix of an ascending record slice inside `window`.
fn within(records: &[ProbeRecord], window: Window, now: DateTime<Utc>) -> &[ProbeRecord] {
    match window.since(now) {
        None => records,
        Some(cutoff) => {
            let first = records.partition_point(|r| r.timestamp < cutoff);
            &records[first..]
        }
    }
}

/// Uptime over the canonical windows from an all-time ascending history.
pub fn uptime_summary(history: &[ProbeRecord], now: DateTime<Utc>) -> UptimeSummary {
    UptimeSummary {
        overall: uptime_percentage(history),
        last_24h: uptime_percentage(within(history, Window::hours(24), now)),
        last_7d: uptime_percentage(within(history, Window::days(7), now)),
        last_30d: uptime_percentage(within(history, Window::days(30), now)),
    }
}

/// Build a report from an all-time ascending history.
pub fn complete_report(
    history: &[ProbeRecord],
    window: Window,
    target: Option<&str>,
    now: DateTime<Utc>,
) -> CompleteReport {
    let in_window = within(history, window, now);

    CompleteReport {
        generated_at: now,
        window_hours: window.as_hours(),
        target: target.map(str::to_string),
        uptime: uptime_summary(history, now),
        outages: OutageSummary::from(detect_outages(in_window)),
        performance: performance_stats(in_window),
        last_check: in_window.last().cloned(),
    }
}

/// Store-backed analytics.
#[derive(Clone)]
pub struct Analytics {
    store: Arc<Store>,
}

impl Analytics {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    fn records(&self, window: Window, target: Option<&str>, now: DateTime<Utc>) -> Option<Vec<ProbeRecord>> {
        let filter = RecordFilter::all().target(target).since(window.since(now));
        match self.store.query(&filter) {
            Ok(records) => Some(records),
            Err(e) => {
                tracing::error!("Analytics: Failed to read history: {}", e);
                None
            }
        }
    }

    pub fn uptime_percentage(&self, window: Window, target: Option<&str>) -> f64 {
        self.records(window, target, Utc::now())
            .map_or(0.0, |r| uptime_percentage(&r))
    }

    pub fn uptime_summary(&self, target: Option<&str>) -> UptimeSummary {
        let now = Utc::now();
        self.records(Window::AllTime, target, now)
            .map_or_else(UptimeSummary::default, |r| uptime_summary(&r, now))
    }

    pub fn detect_outages(&self, window: Window, target: Option<&str>) -> Vec<OutagePeriod> {
        self.records(window, target, Utc::now())
            .map_or_else(Vec::new, |r| detect_outages(&r))
    }

    pub fn performance_stats(&self, window: Window, target: Option<&str>) -> PerformanceStats {
        self.records(window, target, Utc::now())
            .map_or_else(PerformanceStats::default, |r| performance_stats(&r))
    }

    pub fn complete_report(&self, window: Window, target: Option<&str>) -> CompleteReport {
        self.complete_report_at(Utc::now(), window, target)
    }

    /// Report as of `now`, from a single snapshot of the history.
    pub fn complete_report_at(
        &self,
        now: DateTime<Utc>,
        window: Window,
        target: Option<&str>,
    ) -> CompleteReport {
        match self.records(Window::AllTime, target, now) {
            Some(history) => complete_report(&history, window, target, now),
            None => CompleteReport::empty(now, window.as_hours(), target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::broken_store;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
    }

    fn ago(hours: i64) -> DateTime<Utc> {
        now() - ChronoDuration::hours(hours)
    }

    fn seeded() -> Analytics {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let rows = [
            ProbeRecord::up("a", ago(24 * 20), Some(200), 0.9, 0),
            ProbeRecord::down("a", ago(24 * 3), None, "timeout", 2),
            ProbeRecord::up("a", ago(30), Some(200), 0.4, 0),
            ProbeRecord::down("a", ago(3), Some(503), "HTTP 503", 2),
            ProbeRecord::down("a", ago(2), None, "timeout", 2),
            ProbeRecord::up("a", ago(1), Some(200), 0.2, 1),
            ProbeRecord::up("b", ago(1), Some(200), 0.6, 0),
        ];
        for r in &rows {
            store.insert(r).unwrap();
        }
        Analytics::new(store)
    }

    #[test]
    fn test_window() {
        assert_eq!(Window::AllTime.since(now()), None);
        assert_eq!(Window::hours(24).since(now()), Some(ago(24)));
        assert_eq!(Window::days(7).as_hours(), Some(168));
        assert_eq!(Window::AllTime.as_hours(), None);
    }

    #[test]
    fn test_huge_window_covers_everything() {
        let window = Window::hours(u32::MAX);
        assert_eq!(window.since(now()), None);
        assert_eq!(window.as_hours(), Some(i64::from(u32::MAX)));

        let report = seeded().complete_report_at(now(), window, None);
        assert_eq!(report.window_hours, Some(i64::from(u32::MAX)));
        assert_eq!(report.performance.total_checks, 7);
    }

    #[test]
    fn test_unreadable_store_degrades_to_empty_report() {
        let (_tmp, store) = broken_store();
        let analytics = Analytics::new(Arc::new(store));

        let report = analytics.complete_report_at(now(), Window::hours(24), Some("a"));
        assert_eq!(report, CompleteReport::empty(now(), Some(24), Some("a")));
        assert_eq!(analytics.uptime_summary(None), UptimeSummary::default());
        assert!(analytics.detect_outages(Window::AllTime, None).is_empty());
    }

    #[test]
    fn test_uptime_summary_windows() {
        let analytics = seeded();
        let history = analytics
            .store
            .query(&RecordFilter::all().target(Some("a")))
            .unwrap();
        let summary = uptime_summary(&history, now());

        assert_eq!(summary.overall, 50.0);
        assert_eq!(summary.last_24h, 33.33);
        assert_eq!(summary.last_7d, 40.0);
        assert_eq!(summary.last_30d, 50.0);
    }

    #[test]
    fn test_complete_report_for_target() {
        let report = seeded().complete_report_at(now(), Window::hours(24), Some("a"));

        assert_eq!(report.generated_at, now());
        assert_eq!(report.window_hours, Some(24));
        assert_eq!(report.target.as_deref(), Some("a"));
        assert_eq!(report.uptime.overall, 50.0);

        assert_eq!(report.outages.total_outages, 1);
        assert_eq!(report.outages.outages[0].failed_count, 2);
        assert_eq!(report.outages.outages[0].duration_minutes, 60);
        assert!(!report.outages.outages[0].ongoing);
        assert_eq!(report.outages.longest_outage_minutes, 60);

        assert_eq!(report.performance.total_checks, 3);
        assert_eq!(report.performance.failed_checks, 2);
        assert_eq!(report.performance.avg_response_time, 0.2);

        let last = report.last_check.unwrap();
        assert_eq!(last.timestamp, ago(1));
        assert!(last.success());
    }

    #[test]
    fn test_complete_report_all_targets() {
        let report = seeded().complete_report_at(now(), Window::AllTime, None);
        assert_eq!(report.window_hours, None);
        assert_eq!(report.performance.total_checks, 7);
        assert_eq!(report.performance.successful_checks, 4);
        assert_eq!(report.performance.max_response_time, 0.9);
    }

    #[test]
    fn test_empty_history_is_zeroed() {
        let analytics = Analytics::new(Arc::new(Store::open_in_memory().unwrap()));
        let report = analytics.complete_report_at(now(), Window::hours(24), None);

        assert_eq!(report, CompleteReport::empty(now(), Some(24), None));
        assert_eq!(analytics.uptime_percentage(Window::AllTime, None), 0.0);
        assert!(analytics.detect_outages(Window::days(7), Some("x")).is_empty());
        assert_eq!(
            analytics.performance_stats(Window::AllTime, None),
            PerformanceStats::default()
        );
        assert_eq!(analytics.uptime_summary(None), UptimeSummary::default());
    }

    #[test]
    fn test_unknown_target_is_zeroed() {
        let report = seeded().complete_report_at(now(), Window::hours(24), Some("missing"));
        assert_eq!(report.uptime, UptimeSummary::default());
        assert_eq!(report.performance, PerformanceStats::default());
        assert!(report.last_check.is_none());
    }
}
