//! uptrail - website availability monitor.

use uptrail::config::ServerConfig;
use uptrail::db::Store;
use uptrail::probe::{normalize_target, HttpTransport, Prober};
use uptrail::scheduler::{MonitorJob, RetentionManager};
use uptrail::web::Server;
use uptrail::Monitor;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("uptrail=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting uptrail on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    let prober = Prober::new(Arc::new(HttpTransport::new()?));
    let monitor = Monitor::new(store.clone(), prober, cfg.healthy_status());

    // Start one scheduled monitor per configured target. First probes run in
    // the background so the API is up without waiting on slow targets.
    let policy = cfg.probe_policy();
    let mut starting = Vec::new();
    for raw in &cfg.targets {
        match normalize_target(raw) {
            Ok(target) => starting.push(
                monitor
                    .scheduler()
                    .start_detached(MonitorJob::new(target, cfg.check_interval(), policy.clone())),
            ),
            Err(e) => tracing::warn!("Skipping target {:?}: {}", raw, e),
        }
    }

    let retention = cfg.retention_days.map(|days| {
        tracing::info!("Pruning records older than {} days", days);
        let manager = RetentionManager::new(store.clone(), days);
        manager.start();
        manager
    });

    // Serve until Ctrl-C
    let server = Server::new(cfg, monitor.clone());
    server
        .start(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    for pending in &starting {
        pending.abort();
    }
    monitor.scheduler().stop_all().await;
    if let Some(manager) = retention {
        manager.stop().await;
    }
    tracing::info!("Monitoring stopped");

    Ok(())
}
