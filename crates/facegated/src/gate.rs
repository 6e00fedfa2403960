//! Session/audit side effects of a login decision.

use facegate_audit::{AuditError, AuditStore};
use facegate_core::MatchResult;
use thiserror::Error;
use tower_sessions::Session;

/// Session key holding the authenticated identity.
pub const SESSION_USER_KEY: &str = "username";

/// Message returned when no face in the frame matched the gallery.
pub const DENIED_MESSAGE: &str = "Access Denied: Face not recognized.";

/// Where a granted login sends the browser.
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug)]
pub enum GateOutcome {
    Granted {
        identity: String,
        redirect: &'static str,
    },
    Denied {
        message: &'static str,
    },
}

/// A match was decided but its side effects could not be completed.
///
/// Always reported as a server error, never as success or as a plain denial.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("failed to record login: {0}")]
    Persistence(#[from] AuditError),
    #[error("failed to establish session: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Apply a match verdict.
///
/// On a match the audit record is written first and the session is bound only
/// once the write succeeded, so a failed write never leaves the caller logged
/// in. The session ID is rotated before the identity is bound; a token issued
/// before the login never carries it. A denial touches neither the session nor
/// the store.
pub async fn on_attempt(
    result: MatchResult,
    session: &Session,
    audit: &AuditStore,
) -> Result<GateOutcome, GateError> {
    let MatchResult::Matched { identity, distance } = result else {
        tracing::info!("login denied: face not recognized");
        return Ok(GateOutcome::Denied {
            message: DENIED_MESSAGE,
        });
    };

    let record = audit.append(&identity).await?;
    session.cycle_id().await?;
    session.insert(SESSION_USER_KEY, &identity).await?;

    tracing::info!(%identity, distance, record = record.id, "login granted");
    Ok(GateOutcome::Granted {
        identity,
        redirect: DASHBOARD_PATH,
    })
}

/// The identity bound to this session, if any.
pub async fn current_user(session: &Session) -> Result<Option<String>, tower_sessions::session::Error> {
    session.get::<String>(SESSION_USER_KEY).await
}

/// Drop the session entirely.
pub async fn logout(session: &Session) -> Result<(), tower_sessions::session::Error> {
    if let Some(user) = current_user(session).await? {
        tracing::info!(%user, "logout");
    }
    session.flush().await
}
