//! uptrail - availability monitoring engine
//!
//! Periodically probes HTTP endpoints, keeps every outcome in an append-only
//! SQLite history, and derives uptime, outage, and response-time reports from
//! it on demand.

pub mod analytics;
pub mod config;
pub mod db;
pub mod monitor;
pub mod probe;
pub mod scheduler;
pub mod web;

pub use monitor::{Monitor, MonitorError};
