//! Entry points used by the presentation layer.

use crate::analytics::{Analytics, CompleteReport, UptimeSummary, Window};
use crate::db::{DbError, ProbeRecord, RecordFilter, Store};
use crate::probe::{normalize_target, HealthyStatus, InvalidTarget, ProbePolicy, Prober};
use crate::scheduler::{check_and_save, Scheduler};

use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced to callers of [`Monitor`].
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("store error: {0}")]
    Store(#[from] DbError),
}

/// Blank filters mean "all targets". Anything else is normalized the same
/// way probe targets are, so `example.com` finds `https://example.com`.
fn report_target(target: Option<&str>) -> Option<String> {
    let raw = target.map(str::trim).filter(|t| !t.is_empty())?;
    Some(normalize_target(raw).unwrap_or_else(|_| raw.to_string()))
}

/// Ties the store, prober, scheduler, and analytics together.
#[derive(Clone)]
pub struct Monitor {
    store: Arc<Store>,
    prober: Prober,
    scheduler: Scheduler,
    analytics: Analytics,
    on_demand: ProbePolicy,
}

impl Monitor {
    pub fn new(store: Arc<Store>, prober: Prober, healthy: HealthyStatus) -> Self {
        Self {
            scheduler: Scheduler::new(store.clone(), prober.clone()),
            analytics: Analytics::new(store.clone()),
            store,
            prober,
            on_demand: ProbePolicy::on_demand(healthy),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Probe a user-supplied target once and save the result.
    ///
    /// Bare hostnames get an `https://` prefix. Invalid input is rejected
    /// before any request is made. A failed save is logged and the unsaved
    /// record is still returned.
    pub async fn run_on_demand_probe(&self, raw_input: &str) -> Result<ProbeRecord, InvalidTarget> {
        let target = normalize_target(raw_input)?;
        tracing::info!("On-demand check requested for {}", target);
        Ok(check_and_save(&self.prober, &self.store, &target, &self.on_demand).await)
    }

    /// Report for the last `window_hours` hours (`0` means all-time).
    pub fn get_report(&self, window_hours: u32, target: Option<&str>) -> CompleteReport {
        let window = if window_hours == 0 {
            Window::AllTime
        } else {
            Window::hours(window_hours)
        };
        let target = report_target(target);
        self.analytics.complete_report(window, target.as_deref())
    }

    /// Uptime over the canonical windows, filtered like [`Monitor::get_report`].
    pub fn uptime_summary(&self, target: Option<&str>) -> UptimeSummary {
        let target = report_target(target);
        self.analytics.uptime_summary(target.as_deref())
    }

    /// Newest records first; empty if the store cannot be read.
    pub fn recent(&self, limit: u32) -> Vec<ProbeRecord> {
        self.store.recent(limit).unwrap_or_else(|e| {
            tracing::error!("Failed to read recent checks: {}", e);
            Vec::new()
        })
    }

    /// Total stored records, for health reporting.
    pub fn total_checks(&self) -> Result<i64, MonitorError> {
        Ok(self.store.count(&RecordFilter::all())?)
    }
}
