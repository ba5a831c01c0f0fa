//! Scheduler module for running periodic probes.

mod retention;

pub use retention::*;

use crate::db::{ProbeRecord, Store};
use crate::probe::{ProbePolicy, Prober};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// What to monitor and how often.
#[derive(Debug, Clone)]
pub struct MonitorJob {
    pub target: String,
    pub interval: Duration,
    pub policy: ProbePolicy,
}

impl MonitorJob {
    pub fn new(target: impl Into<String>, interval: Duration, policy: ProbePolicy) -> Self {
        Self {
            target: target.into(),
            interval,
            policy,
        }
    }
}

/// Owned handle to one running monitor.
///
/// Cloning yields another handle to the same monitor. Stopping is idempotent.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    target: String,
    stop_tx: broadcast::Sender<()>,
    running: Arc<AtomicBool>,
}

impl MonitorHandle {
    fn new(target: String) -> (Self, broadcast::Receiver<()>) {
        let (stop_tx, stop_rx) = broadcast::channel(1);
        let handle = Self {
            target,
            stop_tx,
            running: Arc::new(AtomicBool::new(true)),
        };
        (handle, stop_rx)
    }

    /// Cancel the timer. An in-flight probe still completes and is saved.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            let _ = self.stop_tx.send(());
            tracing::info!("Scheduler: Stopped monitoring {}", self.target);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn same_monitor(&self, other: &MonitorHandle) -> bool {
        Arc::ptr_eq(&self.running, &other.running)
    }
}

/// Drives periodic probes, one independent task per target.
#[derive(Clone)]
pub struct Scheduler {
    store: Arc<Store>,
    prober: Prober,
    jobs: Arc<RwLock<HashMap<String, MonitorHandle>>>,
}

impl Scheduler {
    /// Create a new scheduler with the given store and prober.
    pub fn new(store: Arc<Store>, prober: Prober) -> Self {
        Self {
            store,
            prober,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start monitoring a target.
    ///
    /// Runs one probe before returning, then fires every `job.interval`.
    /// Starting a target that is already monitored replaces its timer.
    pub async fn start(&self, job: MonitorJob) -> MonitorHandle {
        if let Some(previous) = self.jobs.write().await.remove(&job.target) {
            tracing::info!("Scheduler: Restarting monitor for {}", job.target);
            previous.stop();
        }

        tracing::info!(
            "Scheduler: Monitoring {} every {:?} (timeout {:?}, {} retries)",
            job.target,
            job.interval,
            job.policy.timeout,
            job.policy.max_retries
        );

        if job.interval < job.policy.worst_case() {
            tracing::warn!(
                "Scheduler: Interval for {} is shorter than a worst-case probe ({:?}); fires may be skipped",
                job.target,
                job.policy.worst_case()
            );
        }

        check_and_save(&self.prober, &self.store, &job.target, &job.policy).await;

        let (handle, stop_rx) = MonitorHandle::new(job.target.clone());
        if let Some(raced) = self
            .jobs
            .write()
            .await
            .insert(job.target.clone(), handle.clone())
        {
            raced.stop();
        }

        tokio::spawn(run_probe_loop(
            job,
            self.prober.clone(),
            self.store.clone(),
            stop_rx,
            handle.clone(),
            self.jobs.clone(),
        ));

        handle
    }

    /// Like [`Scheduler::start`], but runs the first probe in the background
    /// so a batch of targets can be started without waiting on each other.
    pub fn start_detached(&self, job: MonitorJob) -> JoinHandle<MonitorHandle> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.start(job).await })
    }

    /// Stop monitoring a target. No-op if it is not monitored.
    pub async fn stop(&self, target: &str) {
        if let Some(handle) = self.jobs.write().await.remove(target) {
            handle.stop();
        }
    }

    /// Stop every monitor. No-op if none are running.
    pub async fn stop_all(&self) {
        let mut jobs = self.jobs.write().await;
        for (_, handle) in jobs.drain() {
            handle.stop();
        }
    }

    pub async fn is_running(&self, target: &str) -> bool {
        self.jobs
            .read()
            .await
            .get(target)
            .is_some_and(MonitorHandle::is_running)
    }

    /// Targets with a live timer, sorted.
    pub async fn running_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|h| h.is_running())
            .map(|h| h.target.clone())
            .collect();
        targets.sort();
        targets
    }
}

/// Probe once and persist the result.
///
/// Store failures are logged; the record is returned either way, with `id`
/// set only if it was saved.
pub async fn check_and_save(
    prober: &Prober,
    store: &Store,
    target: &str,
    policy: &ProbePolicy,
) -> ProbeRecord {
    let mut record = prober.probe(target, policy).await;

    match store.insert(&record) {
        Ok(id) => {
            record.id = Some(id);
            if record.success() {
                tracing::info!("Check {} is UP (id {})", target, id);
            } else {
                tracing::warn!(
                    "Check {} is DOWN: {} (id {})",
                    target,
                    record.error().unwrap_or_default(),
                    id
                );
            }
        }
        Err(e) => {
            tracing::error!("Failed to save check result for {}: {}", target, e);
        }
    }

    record
}

/// Run the probe loop for a single target.
async fn run_probe_loop(
    job: MonitorJob,
    prober: Prober,
    store: Arc<Store>,
    mut stop_rx: broadcast::Receiver<()>,
    handle: MonitorHandle,
    jobs: Arc<RwLock<HashMap<String, MonitorHandle>>>,
) {
    let period = if job.interval.is_zero() {
        Duration::from_secs(1)
    } else {
        job.interval
    };

    // The first check already ran in `start`.
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            _ = interval.tick() => {}
        }

        // Spread fires so targets sharing an interval don't probe in lockstep
        let jitter = Duration::from_millis(rand::random::<u64>() % 100);
        let fire = {
            let prober = prober.clone();
            let store = store.clone();
            let target = job.target.clone();
            let policy = job.policy.clone();
            tokio::spawn(async move {
                tokio::time::sleep(jitter).await;
                check_and_save(&prober, &store, &target, &policy).await;
            })
        };

        // Wait for this fire before the next tick, but let stop win.
        tokio::select! {
            _ = stop_rx.recv() => break,
            res = fire => {
                if let Err(e) = res {
                    tracing::error!("Scheduler: Check task for {} failed: {}", job.target, e);
                }
            }
        }
    }

    handle.stop();

    let mut jobs = jobs.write().await;
    if jobs
        .get(&job.target)
        .is_some_and(|current| current.same_monitor(&handle))
    {
        jobs.remove(&job.target);
    }
}
