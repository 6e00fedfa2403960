//! facegate-audit: append-only login history.
//!
//! One SQLite table, one row per successful login. Rows are never updated or
//! deleted by this crate. Access goes through `tokio-rusqlite`, which runs the
//! connection on its own thread so async handlers never block on disk I/O.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maximum number of records the dashboard shows.
pub const HISTORY_LIMIT: usize = 20;

/// Display format for timestamps: `YYYY-MM-DD hh:mm:ss AM/PM`.
const DISPLAY_FORMAT: &str = "%Y-%m-%d %I:%M:%S %p";

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS login_history (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    username  TEXT    NOT NULL,
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS login_history_timestamp ON login_history (timestamp);
";

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no audit database at {0}")]
    Missing(PathBuf),
}

/// One successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// Assigned by storage, strictly increasing.
    pub id: i64,
    pub username: String,
    /// UTC instant the record was created, microsecond precision.
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    /// Timestamp rendered as `YYYY-MM-DD hh:mm:ss AM/PM` (UTC).
    pub fn display_timestamp(&self) -> String {
        self.timestamp.format(DISPLAY_FORMAT).to_string()
    }
}

/// Handle to the durable audit table. Cheap to clone; clones share one
/// connection.
#[derive(Clone, Debug)]
pub struct AuditStore {
    conn: tokio_rusqlite::Connection,
}

impl AuditStore {
    /// Open or create the store at `path`, creating parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = tokio_rusqlite::Connection::open(path).await?;
        let store = Self::init(conn).await?;
        tracing::info!(path = %path.display(), "audit store opened");
        Ok(store)
    }

    /// Open a database that must already exist. Nothing is created on disk.
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(AuditError::Missing(path.to_path_buf()));
        }
        let conn = tokio_rusqlite::Connection::open(path).await?;
        Self::init(conn).await
    }

    /// Volatile store for tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, AuditError> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: tokio_rusqlite::Connection) -> Result<Self, AuditError> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA_SQL)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    /// Append a record for `username`, stamped with the current UTC time.
    ///
    /// A single INSERT: either the row is durable when this returns `Ok`, or
    /// nothing was written.
    pub async fn append(&self, username: &str) -> Result<AuditRecord, AuditError> {
        let username = username.to_string();
        let timestamp = now_micros();

        let record = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO login_history (username, timestamp) VALUES (?1, ?2)",
                    params![username, timestamp.timestamp_micros()],
                )?;
                Ok(AuditRecord {
                    id: conn.last_insert_rowid(),
                    username,
                    timestamp,
                })
            })
            .await?;

        tracing::debug!(id = record.id, username = %record.username, "audit record appended");
        Ok(record)
    }

    /// The `limit` most recent records, newest first.
    ///
    /// Records sharing a timestamp are ordered by descending id.
    pub async fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>, AuditError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, username, timestamp FROM login_history
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], decode_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        Ok(records)
    }

    /// Total number of records.
    pub async fn count(&self) -> Result<u64, AuditError> {
        let count = self
            .conn
            .call(|conn| {
                let n: i64 =
                    conn.query_row("SELECT COUNT(*) FROM login_history", [], |row| row.get(0))?;
                Ok(n)
            })
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Close the underlying connection. Other clones fail from then on.
    pub async fn close(self) -> Result<(), AuditError> {
        self.conn.close().await?;
        Ok(())
    }
}

/// Current UTC time truncated to the microsecond precision stored on disk.
fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

fn decode_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditRecord> {
    let micros: i64 = row.get(2)?;
    let timestamp = DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(2, micros))?;
    Ok(AuditRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let store = AuditStore::open_in_memory().await.unwrap();
        let a = store.append("alice").await.unwrap();
        let b = store.append("bob").await.unwrap();
        assert!(b.id > a.id);
        assert!(b.timestamp >= a.timestamp);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_recent_newest_first() {
        let store = AuditStore::open_in_memory().await.unwrap();
        for name in ["alice", "bob", "carol"] {
            store.append(name).await.unwrap();
        }
        let names: Vec<String> = store
            .recent(HISTORY_LIMIT)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.username)
            .collect();
        assert_eq!(names, vec!["carol", "bob", "alice"]);
    }

    #[tokio::test]
    async fn test_recent_caps_at_limit() {
        let store = AuditStore::open_in_memory().await.unwrap();
        for i in 0..25 {
            store.append(&format!("user{i}")).await.unwrap();
        }
        let recent = store.recent(HISTORY_LIMIT).await.unwrap();
        assert_eq!(recent.len(), HISTORY_LIMIT);
        assert_eq!(recent[0].username, "user24");
        assert_eq!(recent[19].username, "user5");
        assert!(recent.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_recent_empty_store() {
        let store = AuditStore::open_in_memory().await.unwrap();
        assert!(store.recent(HISTORY_LIMIT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_preserves_timestamp() {
        let store = AuditStore::open_in_memory().await.unwrap();
        let written = store.append("alice").await.unwrap();
        let read = store.recent(1).await.unwrap().remove(0);
        assert_eq!(read, written);
    }

    #[tokio::test]
    async fn test_append_after_close_fails() {
        let store = AuditStore::open_in_memory().await.unwrap();
        let handle = store.clone();
        store.close().await.unwrap();
        assert!(handle.append("alice").await.is_err());
    }

    #[tokio::test]
    async fn test_open_file_persists_across_reopen() {
        let path = std::env::temp_dir()
            .join(format!("facegate-audit-{}", std::process::id()))
            .join("history.db");
        let _ = std::fs::remove_file(&path);

        let store = AuditStore::open(&path).await.unwrap();
        store.append("alice").await.unwrap();
        store.close().await.unwrap();

        let reopened = AuditStore::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        reopened.close().await.unwrap();
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_open_existing_requires_file() {
        let dir = std::env::temp_dir().join(format!("facegate-audit-missing-{}", std::process::id()));
        let path = dir.join("history.db");

        let err = AuditStore::open_existing(&path).await.unwrap_err();
        assert!(matches!(err, AuditError::Missing(p) if p == path));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_open_existing_reads_records() {
        let path = std::env::temp_dir()
            .join(format!("facegate-audit-existing-{}", std::process::id()))
            .join("history.db");
        let _ = std::fs::remove_file(&path);

        let store = AuditStore::open(&path).await.unwrap();
        store.append("bob").await.unwrap();
        store.close().await.unwrap();

        let existing = AuditStore::open_existing(&path).await.unwrap();
        assert_eq!(existing.recent(HISTORY_LIMIT).await.unwrap()[0].username, "bob");
        existing.close().await.unwrap();
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_display_timestamp_12_hour() {
        let record = AuditRecord {
            id: 1,
            username: "alice".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 9, 15, 4, 5).unwrap(),
        };
        assert_eq!(record.display_timestamp(), "2024-03-09 03:04:05 PM");
    }

    #[test]
    fn test_display_timestamp_midnight() {
        let record = AuditRecord {
            id: 1,
            username: "alice".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        assert_eq!(record.display_timestamp(), "2024-01-01 12:00:00 AM");
    }
}
