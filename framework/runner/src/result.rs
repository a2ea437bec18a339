use std::time::Duration;

use crate::error::UserLookupError;
use crate::task::SessionTask;

/// Everything that happened to one user's sessions during a run.
///
/// Built up as each session finishes, then finalized once the user's run is over.
#[derive(Debug, Clone)]
pub struct UserRunResult {
    pub username: String,
    pub total_sessions: usize,
    pub successful_sessions: usize,
    pub failed_sessions: usize,
    pub tasks: Vec<SessionTask>,
    pub total_time_to_ready: Duration,
    /// Only meaningful after [UserRunResult::finalize].
    pub average_time_to_ready: Duration,
    pub total_duration: Duration,
    pub errors: Vec<String>,
}

impl UserRunResult {
    pub fn new(username: String, total_sessions: usize) -> Self {
        Self {
            username,
            total_sessions,
            successful_sessions: 0,
            failed_sessions: 0,
            tasks: Vec::with_capacity(total_sessions),
            total_time_to_ready: Duration::ZERO,
            average_time_to_ready: Duration::ZERO,
            total_duration: Duration::ZERO,
            errors: Vec::new(),
        }
    }

    /// The user could not be resolved so none of their sessions were attempted. They are all
    /// counted as failed.
    pub fn lookup_failed(username: String, total_sessions: usize, error: &UserLookupError) -> Self {
        Self::aborted(username, total_sessions, error)
    }

    /// The user's run ended without producing a result, for example because it was interrupted.
    /// Every session is counted as failed.
    pub fn aborted(username: String, total_sessions: usize, error: impl std::fmt::Display) -> Self {
        let mut result = Self::new(username, total_sessions);
        result.failed_sessions = total_sessions;
        result.errors.push(error.to_string());
        result
    }

    pub fn record(&mut self, task: SessionTask) {
        if task.is_successful() {
            self.successful_sessions += 1;
        } else {
            self.failed_sessions += 1;
            if let Some(error) = &task.execution_error {
                self.errors
                    .push(format!("Session {}: {}", task.number(), error));
            }
        }
        self.total_time_to_ready += task.time_to_ready();
        self.tasks.push(task);
    }

    pub fn finalize(&mut self, total_duration: Duration) {
        self.total_duration = total_duration;
        self.average_time_to_ready = match u32::try_from(self.tasks.len()) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(count) => self.total_time_to_ready / count,
        };
    }
}
