//! Composable filters over the `checks` table.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;

use super::models::ProbeRecord;
use super::store::format_db_time;

/// A single condition a record must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Exact target match.
    TargetEq(String),
    /// `timestamp >= t`
    Since(DateTime<Utc>),
    /// `timestamp < t`
    Before(DateTime<Utc>),
}

impl Predicate {
    fn to_sql(&self) -> (&'static str, Value) {
        match self {
            Predicate::TargetEq(t) => ("target = ?", Value::Text(t.clone())),
            Predicate::Since(t) => ("timestamp >= ?", Value::Text(format_db_time(t))),
            Predicate::Before(t) => ("timestamp < ?", Value::Text(format_db_time(t))),
        }
    }

    fn matches(&self, record: &ProbeRecord) -> bool {
        match self {
            Predicate::TargetEq(t) => record.target == *t,
            Predicate::Since(t) => record.timestamp >= *t,
            Predicate::Before(t) => record.timestamp < *t,
        }
    }
}

/// Conjunction of predicates. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    predicates: Vec<Predicate>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one target; `None` leaves the filter unchanged.
    pub fn target(mut self, target: Option<&str>) -> Self {
        if let Some(t) = target {
            self.predicates.push(Predicate::TargetEq(t.to_string()));
        }
        self
    }

    /// Restrict to records at or after `since`; `None` leaves the filter unchanged.
    pub fn since(mut self, since: Option<DateTime<Utc>>) -> Self {
        if let Some(t) = since {
            self.predicates.push(Predicate::Since(t));
        }
        self
    }

    /// Restrict to records strictly before `before`.
    pub fn before(mut self, before: Option<DateTime<Utc>>) -> Self {
        if let Some(t) = before {
            self.predicates.push(Predicate::Before(t));
        }
        self
    }

    /// Render as a `WHERE` clause (empty when unfiltered) plus bound parameters.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        if self.predicates.is_empty() {
            return (String::new(), Vec::new());
        }

        let (clauses, params): (Vec<&str>, Vec<Value>) =
            self.predicates.iter().map(Predicate::to_sql).unzip();

        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }

    /// Evaluate against an in-memory record.
    pub fn matches(&self, record: &ProbeRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }
}
