//! Database model types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Final outcome of one probe. Carries exactly the field that is valid for it,
/// so a successful record always has a response time and a failed one always
/// has an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ProbeOutcome {
    Up {
        /// Elapsed seconds of the successful attempt.
        response_time: f64,
    },
    Down {
        error: String,
    },
}

/// One immutable probe result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeRecord {
    /// Assigned by the store on insert; `None` until persisted.
    pub id: Option<i64>,
    pub target: String,
    pub timestamp: DateTime<Utc>,
    pub status_code: Option<u16>,
    pub retries: u32,
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
}

impl ProbeRecord {
    /// Build a successful record. Negative response times are clamped to zero.
    pub fn up(
        target: impl Into<String>,
        timestamp: DateTime<Utc>,
        status_code: Option<u16>,
        response_time: f64,
        retries: u32,
    ) -> Self {
        Self {
            id: None,
            target: target.into(),
            timestamp,
            status_code,
            retries,
            outcome: ProbeOutcome::Up {
                response_time: response_time.max(0.0),
            },
        }
    }

    /// Build a failed record.
    pub fn down(
        target: impl Into<String>,
        timestamp: DateTime<Utc>,
        status_code: Option<u16>,
        error: impl Into<String>,
        retries: u32,
    ) -> Self {
        Self {
            id: None,
            target: target.into(),
            timestamp,
            status_code,
            retries,
            outcome: ProbeOutcome::Down {
                error: error.into(),
            },
        }
    }

    pub fn success(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Up { .. })
    }

    pub fn response_time(&self) -> Option<f64> {
        match self.outcome {
            ProbeOutcome::Up { response_time } => Some(response_time),
            ProbeOutcome::Down { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ProbeOutcome::Up { .. } => None,
            ProbeOutcome::Down { error } => Some(error),
        }
    }
}

/// Flat row shape as stored in the `checks` table.
#[derive(Debug, Clone)]
pub(crate) struct CheckRow {
    pub id: i64,
    pub target: String,
    pub timestamp: String,
    pub status_code: Option<i64>,
    pub response_time: Option<f64>,
    pub success: bool,
    pub error: Option<String>,
    pub retries: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_enforce_field_pairing() {
        let now = Utc::now();

        let up = ProbeRecord::up("https://example.com", now, Some(200), 0.42, 0);
        assert!(up.success());
        assert_eq!(up.response_time(), Some(0.42));
        assert_eq!(up.error(), None);

        let down = ProbeRecord::down("https://example.com", now, None, "boom", 2);
        assert!(!down.success());
        assert_eq!(down.response_time(), None);
        assert_eq!(down.error(), Some("boom"));
        assert_eq!(down.retries, 2);
    }

    #[test]
    fn test_negative_response_time_clamped() {
        let up = ProbeRecord::up("t", Utc::now(), Some(200), -1.0, 0);
        assert_eq!(up.response_time(), Some(0.0));
    }

    #[test]
    fn test_serializes_flat() {
        let up = ProbeRecord::up("t", Utc::now(), Some(204), 0.5, 1);
        let json = serde_json::to_value(&up).unwrap();
        assert_eq!(json["outcome"], "up");
        assert_eq!(json["response_time"], 0.5);
        assert_eq!(json["status_code"], 204);
        assert!(json.get("error").is_none());
    }
}
