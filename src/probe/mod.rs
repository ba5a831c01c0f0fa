//! Probe module for availability checks.
//!
//! A [`Prober`] runs one check against one target with bounded retries and
//! turns every failure into a [`ProbeRecord`]; nothing escapes as an error.

mod http;

pub use http::*;

use crate::db::ProbeRecord;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use reqwest::Url;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fixed pause between failed attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Timeout - target took longer than {} seconds", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("Connection failed - cannot reach target")]
    Connect(String),
    #[error("HTTP {0}")]
    UnhealthyStatus(u16),
    #[error("Unexpected error: {0}")]
    Other(String),
}

/// Which response statuses count as healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthyStatus {
    /// 2xx and 3xx.
    #[default]
    SuccessOrRedirect,
    /// 2xx only.
    SuccessOnly,
}

impl HealthyStatus {
    pub fn from_accept_redirects(accept: bool) -> Self {
        if accept {
            Self::SuccessOrRedirect
        } else {
            Self::SuccessOnly
        }
    }

    pub fn is_healthy(self, status: u16) -> bool {
        match self {
            Self::SuccessOrRedirect => (200..400).contains(&status),
            Self::SuccessOnly => (200..300).contains(&status),
        }
    }
}

/// Timeout, retry, and classification settings for one probe.
#[derive(Debug, Clone)]
pub struct ProbePolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
    pub healthy: HealthyStatus,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: 2,
            backoff: DEFAULT_BACKOFF,
            healthy: HealthyStatus::default(),
        }
    }
}

impl ProbePolicy {
    /// Single short attempt used for user-triggered checks.
    pub fn on_demand(healthy: HealthyStatus) -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
            backoff: DEFAULT_BACKOFF,
            healthy,
        }
    }

    /// Upper bound on wall-clock time one probe can take.
    pub fn worst_case(&self) -> Duration {
        self.timeout * self.max_retries.saturating_add(1) + self.backoff * self.max_retries
    }
}

/// Issues a single request to a target.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Return the response status code, or why no response was received.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<u16, ProbeError>;
}

/// Runs availability checks. Holds no per-target state.
#[derive(Clone)]
pub struct Prober {
    transport: Arc<dyn Transport>,
}

impl Prober {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Probe `target` up to `max_retries + 1` times.
    ///
    /// The returned record is timestamped at completion. On success it carries
    /// the elapsed time of the successful attempt only and the number of
    /// attempts that failed before it.
    pub async fn probe(&self, target: &str, policy: &ProbePolicy) -> ProbeRecord {
        let attempts = policy.max_retries.saturating_add(1);
        let mut last_error = ProbeError::Other("no attempt made".to_string());
        let mut last_status = None;

        for attempt in 0..attempts {
            let start = Instant::now();

            match self.attempt(target, policy.timeout).await {
                Ok(status) if policy.healthy.is_healthy(status) => {
                    let elapsed = start.elapsed().as_secs_f64();
                    return ProbeRecord::up(target, Utc::now(), Some(status), elapsed, attempt);
                }
                Ok(status) => {
                    last_status = Some(status);
                    last_error = ProbeError::UnhealthyStatus(status);
                }
                Err(e) => {
                    if let ProbeError::Connect(detail) = &e {
                        tracing::debug!("Probe: {} connect error: {}", target, detail);
                    }
                    last_status = None;
                    last_error = e;
                }
            }

            tracing::debug!(
                "Probe: {} attempt {}/{} failed: {}",
                target,
                attempt + 1,
                attempts,
                last_error
            );

            if attempt + 1 < attempts {
                tokio::time::sleep(policy.backoff).await;
            }
        }

        ProbeRecord::down(
            target,
            Utc::now(),
            last_status,
            last_error.to_string(),
            policy.max_retries,
        )
    }

    /// One attempt, isolated on its own task so a panicking or hanging
    /// transport becomes a failed attempt.
    async fn attempt(&self, target: &str, timeout: Duration) -> Result<u16, ProbeError> {
        let transport = self.transport.clone();
        let url = target.to_string();
        let mut handle = tokio::spawn(async move { transport.fetch(&url, timeout).await });

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ProbeError::Other(format!("probe task failed: {}", e))),
            Err(_) => {
                handle.abort();
                Err(ProbeError::Timeout(timeout))
            }
        }
    }
}

/// Error for user-supplied targets that cannot be probed.
#[derive(Error, Debug, PartialEq)]
#[error("invalid target: {0}")]
pub struct InvalidTarget(pub String);

/// Turn raw user input into a probe URL, defaulting to `https://` when no
/// scheme is given.
pub fn normalize_target(raw: &str) -> Result<String, InvalidTarget> {
    static SCHEME: OnceLock<Regex> = OnceLock::new();
    let scheme = SCHEME.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("static regex is valid")
    });

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InvalidTarget("target must not be empty".to_string()));
    }

    let candidate = if scheme.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| InvalidTarget(format!("{}: {}", trimmed, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(InvalidTarget(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(InvalidTarget(format!("{}: missing host", trimmed)));
    }

    Ok(candidate)
}
