//! Retention manager for pruning old probe history.

use crate::db::Store;

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// How often the retention pass runs.
const RETENTION_INTERVAL: Duration = Duration::from_secs(3600);

/// Manager for deleting records older than a fixed age.
pub struct RetentionManager {
    store: Arc<Store>,
    max_age: ChronoDuration,
    stop: Arc<Mutex<Option<tokio::sync::broadcast::Sender<()>>>>,
}

impl RetentionManager {
    pub fn new(store: Arc<Store>, max_age_days: u32) -> Self {
        Self {
            store,
            max_age: ChronoDuration::days(i64::from(max_age_days)),
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the retention manager background task.
    pub fn start(&self) {
        let store = self.store.clone();
        let stop = self.stop.clone();
        let max_age = self.max_age;

        tokio::spawn(async move {
            let (tx, _) = tokio::sync::broadcast::channel(1);
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            let mut interval = tokio::time::interval(RETENTION_INTERVAL);

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        process_retention(&store, max_age);
                    }
                }
            }
        });
    }

    /// Stop the retention manager.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }

    /// Run one pass now and return the number of removed records.
    pub fn run_once(&self) -> usize {
        process_retention(&self.store, self.max_age)
    }
}

fn process_retention(store: &Store, max_age: ChronoDuration) -> usize {
    let cutoff = Utc::now() - max_age;

    match store.prune_older_than(cutoff) {
        Ok(0) => 0,
        Ok(removed) => {
            tracing::info!(
                "RetentionManager: Removed {} records older than {}",
                removed,
                cutoff.format("%Y-%m-%d %H:%M:%S")
            );
            removed
        }
        Err(e) => {
            tracing::error!("RetentionManager: Failed to prune records: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ProbeRecord, RecordFilter};

    #[test]
    fn test_run_once_prunes_by_age() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let now = Utc::now();
        store
            .insert(&ProbeRecord::up("a", now - ChronoDuration::days(40), Some(200), 0.1, 0))
            .unwrap();
        store
            .insert(&ProbeRecord::down("a", now - ChronoDuration::days(31), None, "x", 0))
            .unwrap();
        store
            .insert(&ProbeRecord::up("a", now - ChronoDuration::days(2), Some(200), 0.1, 0))
            .unwrap();

        let manager = RetentionManager::new(store.clone(), 30);
        assert_eq!(manager.run_once(), 2);
        assert_eq!(manager.run_once(), 0);
        assert_eq!(store.count(&RecordFilter::all()).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_start_runs_first_pass_and_stops() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .insert(&ProbeRecord::up("a", Utc::now() - ChronoDuration::days(10), Some(200), 0.1, 0))
            .unwrap();

        let manager = RetentionManager::new(store.clone(), 7);
        manager.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        manager.stop().await;

        assert_eq!(store.count(&RecordFilter::all()).unwrap(), 0);
    }
}
