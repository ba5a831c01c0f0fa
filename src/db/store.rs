//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;
use super::query::RecordFilter;

mod embedded {
    refinery::embed_migrations!("migrations");
}

const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// Thread-safe, append-only store of probe records.
///
/// All writers share one connection behind a mutex, so concurrent inserts
/// from scheduled and on-demand probes are serialized.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Create a store backed by a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Apply embedded migrations.
    fn init(&self) -> Result<(), DbError> {
        let mut conn = self.conn()?;
        embedded::migrations::runner()
            .run(&mut *conn)
            .map_err(|e| DbError::Migration(e.to_string()))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    /// Append a record and return its assigned ID.
    ///
    /// The record's own `id` is ignored.
    pub fn insert(&self, record: &ProbeRecord) -> Result<i64, DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO checks (target, timestamp, status_code, response_time, success, error, retries)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.target,
                format_db_time(&record.timestamp),
                record.status_code,
                record.response_time(),
                record.success(),
                record.error(),
                record.retries,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get matching records in ascending timestamp order.
    pub fn query(&self, filter: &RecordFilter) -> Result<Vec<ProbeRecord>, DbError> {
        let (clause, values) = filter.to_sql();
        let sql = format!(
            "SELECT id, target, timestamp, status_code, response_time, success, error, retries
             FROM checks{} ORDER BY timestamp ASC, id ASC",
            clause
        );
        self.select(&sql, params_from_iter(values))
    }

    /// Count matching records.
    pub fn count(&self, filter: &RecordFilter) -> Result<i64, DbError> {
        let (clause, values) = filter.to_sql();
        let conn = self.conn()?;
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM checks{}", clause),
            params_from_iter(values),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Get the newest `limit` records, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<ProbeRecord>, DbError> {
        self.select(
            "SELECT id, target, timestamp, status_code, response_time, success, error, retries
             FROM checks ORDER BY timestamp DESC, id DESC LIMIT ?1",
            params![limit],
        )
    }

    /// Get the distinct targets present in the history.
    pub fn targets(&self) -> Result<Vec<String>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT target FROM checks ORDER BY target")?;
        let targets = stmt
            .query_map([], |row| row.get(0))?
            .collect::<SqlResult<Vec<String>>>()?;
        Ok(targets)
    }

    /// Delete records older than the cutoff and return how many were removed.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM checks WHERE timestamp < ?1",
            params![format_db_time(&cutoff)],
        )?;
        Ok(removed)
    }

    fn select<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<ProbeRecord>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;

        let rows = stmt
            .query_map(params, |row| {
                Ok(CheckRow {
                    id: row.get(0)?,
                    target: row.get(1)?,
                    timestamp: row.get(2)?,
                    status_code: row.get(3)?,
                    response_time: row.get(4)?,
                    success: row.get(5)?,
                    error: row.get(6)?,
                    retries: row.get(7)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        rows.into_iter().map(ProbeRecord::try_from).collect()
    }
}

impl TryFrom<CheckRow> for ProbeRecord {
    type Error = DbError;

    fn try_from(row: CheckRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: &str| DbError::Corrupt {
            id: row.id,
            reason: reason.to_string(),
        };

        let timestamp = parse_db_time(&row.timestamp).ok_or_else(|| corrupt("bad timestamp"))?;
        let status_code = row
            .status_code
            .map(u16::try_from)
            .transpose()
            .map_err(|_| corrupt("status code out of range"))?;
        let retries = u32::try_from(row.retries).map_err(|_| corrupt("negative retries"))?;

        let outcome = match (row.success, row.response_time, row.error) {
            (true, Some(response_time), None) => ProbeOutcome::Up { response_time },
            (false, None, Some(error)) => ProbeOutcome::Down { error },
            _ => return Err(corrupt("outcome fields inconsistent with success flag")),
        };

        Ok(ProbeRecord {
            id: Some(row.id),
            target: row.target,
            timestamp,
            status_code,
            retries,
            outcome,
        })
    }
}

/// Format a timestamp the way it is stored; lexical order equals time order.
pub(crate) fn format_db_time(t: &DateTime<Utc>) -> String {
    t.format(DB_TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [DB_TIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::NamedTempFile;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + Duration::minutes(minute)
    }

    #[test]
    fn test_insert_then_query_roundtrip() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + Duration::nanoseconds(123_456_789);
        let up = ProbeRecord::up("https://example.com", ts, Some(200), 0.3125, 1);
        let down = ProbeRecord::down("https://other.org", ts + Duration::seconds(1), Some(503), "HTTP 503", 2);

        let id1 = store.insert(&up).unwrap();
        let id2 = store.insert(&down).unwrap();
        assert!(id2 > id1);

        let rows = store.query(&RecordFilter::all()).unwrap();
        assert_eq!(rows.len(), 2);

        let mut expected_up = up.clone();
        expected_up.id = Some(id1);
        let mut expected_down = down.clone();
        expected_down.id = Some(id2);
        assert_eq!(rows[0], expected_up);
        assert_eq!(rows[1], expected_down);
    }

    #[test]
    fn test_query_orders_by_timestamp_and_filters() {
        let store = Store::open_in_memory().unwrap();
        store.insert(&ProbeRecord::up("a", at(5), Some(200), 0.1, 0)).unwrap();
        store.insert(&ProbeRecord::up("b", at(1), Some(200), 0.2, 0)).unwrap();
        store.insert(&ProbeRecord::down("a", at(3), None, "timeout", 0)).unwrap();

        let all = store.query(&RecordFilter::all()).unwrap();
        let times: Vec<_> = all.iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![at(1), at(3), at(5)]);

        let only_a = store.query(&RecordFilter::all().target(Some("a"))).unwrap();
        assert_eq!(only_a.len(), 2);
        assert!(only_a.iter().all(|r| r.target == "a"));

        let recent_a = store
            .query(&RecordFilter::all().target(Some("a")).since(Some(at(4))))
            .unwrap();
        assert_eq!(recent_a.len(), 1);
        assert!(recent_a[0].success());
    }

    #[test]
    fn test_count() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.count(&RecordFilter::all()).unwrap(), 0);

        store.insert(&ProbeRecord::up("a", at(0), Some(200), 0.1, 0)).unwrap();
        store.insert(&ProbeRecord::up("b", at(1), Some(200), 0.1, 0)).unwrap();
        store.insert(&ProbeRecord::up("a", at(2), Some(200), 0.1, 0)).unwrap();

        assert_eq!(store.count(&RecordFilter::all()).unwrap(), 3);
        assert_eq!(store.count(&RecordFilter::all().target(Some("a"))).unwrap(), 2);
        assert_eq!(store.count(&RecordFilter::all().target(Some("zzz"))).unwrap(), 0);
    }

    #[test]
    fn test_prune_older_than() {
        let store = Store::open_in_memory().unwrap();
        for m in 0..5 {
            store.insert(&ProbeRecord::up("a", at(m), Some(200), 0.1, 0)).unwrap();
        }

        let removed = store.prune_older_than(at(3)).unwrap();
        assert_eq!(removed, 3);

        let left = store.query(&RecordFilter::all()).unwrap();
        assert_eq!(left.len(), 2);
        assert_eq!(left[0].timestamp, at(3));

        assert_eq!(store.prune_older_than(at(0)).unwrap(), 0);
    }

    #[test]
    fn test_recent_and_targets() {
        let store = Store::open_in_memory().unwrap();
        store.insert(&ProbeRecord::up("b", at(0), Some(200), 0.1, 0)).unwrap();
        store.insert(&ProbeRecord::up("a", at(2), Some(200), 0.1, 0)).unwrap();
        store.insert(&ProbeRecord::down("b", at(1), None, "x", 0)).unwrap();

        let recent = store.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, at(2));
        assert_eq!(recent[1].timestamp, at(1));

        assert_eq!(store.targets().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_concurrent_inserts() {
        let store = Store::open_in_memory().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for m in 0..25 {
                        store
                            .insert(&ProbeRecord::up(format!("t{}", t), at(m), Some(200), 0.1, 0))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.count(&RecordFilter::all()).unwrap(), 100);
        let rows = store.query(&RecordFilter::all().target(Some("t2"))).unwrap();
        assert_eq!(rows.len(), 25);
        assert!(rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_reopen_keeps_history() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let store = Store::new(tmp.path()).unwrap();
            store.insert(&ProbeRecord::up("a", at(0), Some(200), 0.1, 0)).unwrap();
        }
        let store = Store::new(tmp.path()).unwrap();
        assert_eq!(store.count(&RecordFilter::all()).unwrap(), 1);
    }

    #[test]
    fn test_parse_db_time() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_db_time("2024-01-01 12:00:00"), Some(expected));
        assert_eq!(parse_db_time("2024-01-01 12:00:00.000000000"), Some(expected));
        assert_eq!(parse_db_time("2024-01-01T12:00:00Z"), Some(expected));
        assert_eq!(parse_db_time("not a time"), None);
    }
}
