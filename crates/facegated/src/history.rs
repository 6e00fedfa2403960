//! Recent login history for authenticated sessions.

use crate::gate;
use facegate_audit::{AuditError, AuditRecord, AuditStore, HISTORY_LIMIT};
use serde::Serialize;
use thiserror::Error;
use tower_sessions::Session;

#[derive(Debug)]
pub enum HistoryOutcome {
    /// No authenticated session; nothing is read from the store.
    Unauthorized,
    /// Up to `HISTORY_LIMIT` records, newest first.
    Records(Vec<AuditRecord>),
}

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("failed to read login history: {0}")]
    Audit(#[from] AuditError),
    #[error("failed to read session: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Wire shape of one history row.
#[derive(Debug, Serialize)]
pub struct LoginEntry {
    pub id: i64,
    pub username: String,
    /// `YYYY-MM-DD hh:mm:ss AM/PM`, UTC.
    pub timestamp: String,
}

impl From<AuditRecord> for LoginEntry {
    fn from(record: AuditRecord) -> Self {
        Self {
            timestamp: record.display_timestamp(),
            id: record.id,
            username: record.username,
        }
    }
}

pub async fn recent(session: &Session, audit: &AuditStore) -> Result<HistoryOutcome, HistoryError> {
    if gate::current_user(session).await?.is_none() {
        return Ok(HistoryOutcome::Unauthorized);
    }
    Ok(HistoryOutcome::Records(audit.recent(HISTORY_LIMIT).await?))
}
