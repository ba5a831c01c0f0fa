//! Configuration module for uptrail.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::probe::{HealthyStatus, ProbePolicy, DEFAULT_BACKOFF};

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the JSON API (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "uptrail.db")
    pub db_path: String,
    /// Targets monitored on a schedule (default: "https://example.com")
    pub targets: Vec<String>,
    /// Seconds between scheduled checks (default: 30)
    pub check_interval: u64,
    /// Per-attempt timeout in seconds (default: 5)
    pub timeout: u64,
    /// Retries after a failed attempt (default: 2)
    pub max_retries: u32,
    /// Treat 3xx responses as healthy (default: true)
    pub accept_redirects: bool,
    /// Prune records older than this many days; disabled when unset
    pub retention_days: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "uptrail.db".to_string(),
            targets: vec!["https://example.com".to_string()],
            check_interval: 30,
            timeout: 5,
            max_retries: 2,
            accept_redirects: true,
            retention_days: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `UPTRAIL_HTTP_PORT`: HTTP port (default: 8080)
    /// - `UPTRAIL_DB_PATH`: Database file path (default: "uptrail.db")
    /// - `UPTRAIL_TARGETS`: Comma-separated targets (default: "https://example.com")
    /// - `UPTRAIL_CHECK_INTERVAL`: Seconds between checks (default: 30)
    /// - `UPTRAIL_TIMEOUT`: Per-attempt timeout in seconds (default: 5)
    /// - `UPTRAIL_MAX_RETRIES`: Retries per check (default: 2)
    /// - `UPTRAIL_ACCEPT_REDIRECTS`: Count 3xx as healthy (default: true)
    /// - `UPTRAIL_RETENTION_DAYS`: Retention in days (default: unset)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        parse_into(&lookup, "UPTRAIL_HTTP_PORT", &mut cfg.http_port);
        parse_into(&lookup, "UPTRAIL_CHECK_INTERVAL", &mut cfg.check_interval);
        parse_into(&lookup, "UPTRAIL_TIMEOUT", &mut cfg.timeout);
        parse_into(&lookup, "UPTRAIL_MAX_RETRIES", &mut cfg.max_retries);
        parse_into(&lookup, "UPTRAIL_ACCEPT_REDIRECTS", &mut cfg.accept_redirects);

        if let Some(db_path) = lookup("UPTRAIL_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(raw) = lookup("UPTRAIL_TARGETS") {
            let targets: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            if !targets.is_empty() {
                cfg.targets = targets;
            }
        }

        if let Some(days) = lookup("UPTRAIL_RETENTION_DAYS").and_then(|s| s.parse().ok()) {
            cfg.retention_days = Some(days).filter(|d| *d > 0);
        }

        if cfg.check_interval == 0 {
            cfg.check_interval = 30;
        }
        if cfg.timeout == 0 {
            cfg.timeout = 5;
        }

        cfg
    }

    pub fn healthy_status(&self) -> HealthyStatus {
        HealthyStatus::from_accept_redirects(self.accept_redirects)
    }

    /// Policy for scheduled checks.
    pub fn probe_policy(&self) -> ProbePolicy {
        ProbePolicy {
            timeout: Duration::from_secs(self.timeout),
            max_retries: self.max_retries,
            backoff: DEFAULT_BACKOFF,
            healthy: self.healthy_status(),
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(key).and_then(|s| s.trim().parse().ok()) {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "uptrail.db");
        assert_eq!(cfg.targets, vec!["https://example.com".to_string()]);
        assert_eq!(cfg.retention_days, None);
        assert_eq!(cfg.healthy_status(), HealthyStatus::SuccessOrRedirect);
    }

    #[test]
    fn test_overrides() {
        let cfg = from_pairs(&[
            ("UPTRAIL_HTTP_PORT", "9090"),
            ("UPTRAIL_DB_PATH", "/tmp/x.db"),
            ("UPTRAIL_TARGETS", "https://a.com, b.org ,,"),
            ("UPTRAIL_CHECK_INTERVAL", "10"),
            ("UPTRAIL_TIMEOUT", "3"),
            ("UPTRAIL_MAX_RETRIES", "0"),
            ("UPTRAIL_ACCEPT_REDIRECTS", "false"),
            ("UPTRAIL_RETENTION_DAYS", "30"),
        ]);

        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.db_path, "/tmp/x.db");
        assert_eq!(cfg.targets, vec!["https://a.com".to_string(), "b.org".to_string()]);
        assert_eq!(cfg.check_interval(), Duration::from_secs(10));
        assert_eq!(cfg.retention_days, Some(30));

        let policy = cfg.probe_policy();
        assert_eq!(policy.timeout, Duration::from_secs(3));
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.healthy, HealthyStatus::SuccessOnly);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let cfg = from_pairs(&[
            ("UPTRAIL_HTTP_PORT", "not-a-port"),
            ("UPTRAIL_CHECK_INTERVAL", "0"),
            ("UPTRAIL_TARGETS", " , "),
            ("UPTRAIL_RETENTION_DAYS", "0"),
        ]);

        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.check_interval, 30);
        assert_eq!(cfg.targets, vec!["https://example.com".to_string()]);
        assert_eq!(cfg.retention_days, None);
    }
}
