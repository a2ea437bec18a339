use std::time::Duration;

use session_stress_core::prelude::SessionId;

/// Failure to resolve a user. This ends the run for that user before any session is requested.
#[derive(Debug, thiserror::Error)]
#[error("Failed to get user info for {username}: {source:#}")]
pub struct UserLookupError {
    pub username: String,
    #[source]
    pub source: anyhow::Error,
}

/// Reasons a single session did not reach the point where the workload could be executed.
///
/// These never stop the runner from moving on to the next session.
#[derive(Debug, thiserror::Error)]
pub enum SessionFailure {
    #[error("Failed to request session: {0:#}")]
    Create(#[source] anyhow::Error),

    #[error("Received empty session id from service")]
    EmptySessionId,

    #[error("Timed out after {waited:?} waiting for session {session_id} to be ready{}", poll_error_suffix(.last_error))]
    ReadyTimeout {
        session_id: SessionId,
        waited: Duration,
        /// The most recent failed poll, if any. Poll failures are retried until the timeout.
        last_error: Option<String>,
    },

    #[error("Session {session_id} stuck in 'requested' state for longer than {threshold:?}")]
    StuckRequested {
        session_id: SessionId,
        threshold: Duration,
    },
}

impl SessionFailure {
    pub fn is_stuck_requested(&self) -> bool {
        matches!(self, SessionFailure::StuckRequested { .. })
    }
}

fn poll_error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(", last poll error: {e}"))
        .unwrap_or_default()
}

/// A session that could not be destroyed during teardown.
#[derive(Debug, thiserror::Error)]
#[error("Failed to destroy session {session_id} for user {username}: {source:#}")]
pub struct DestroyError {
    pub username: String,
    pub session_id: SessionId,
    #[source]
    pub source: anyhow::Error,
}
