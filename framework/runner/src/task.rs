use std::fmt::{Display, Formatter};
use std::time::Duration;

use session_stress_core::prelude::SessionId;
use tokio::time::Instant;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Planned but not started, because earlier sessions for the same user are still running.
    Pending,
    Requesting,
    Waiting,
    Executing,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    /// Being worked on right now, so its elapsed time keeps growing.
    pub fn is_active(&self) -> bool {
        !self.is_terminal() && *self != TaskState::Pending
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Pending => "Starting",
            TaskState::Requesting => "Requesting session",
            TaskState::Waiting => "Waiting for session",
            TaskState::Executing => "Executing command",
            TaskState::Completed => "Completed",
            TaskState::Failed => "Failed",
        }
    }
}

impl Display for TaskState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One requested session, from the first request to a terminal state.
#[derive(Debug, Clone)]
pub struct SessionTask {
    /// 0-based position of this session within its user's run.
    pub index: usize,
    /// Set once the service has handed back an id for the session.
    pub session_id: Option<SessionId>,
    /// When the session that eventually became ready was requested.
    pub requested_at: Option<Instant>,
    pub ready_at: Option<Instant>,
    pub state: TaskState,
    /// Why the session did not succeed. Covers request and readiness failures as well as
    /// failures running the workload.
    pub execution_error: Option<String>,
}

impl SessionTask {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            session_id: None,
            requested_at: None,
            ready_at: None,
            state: TaskState::Requesting,
            execution_error: None,
        }
    }

    /// 1-based number for display.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// Zero if the session never became ready.
    pub fn time_to_ready(&self) -> Duration {
        match (self.requested_at, self.ready_at) {
            (Some(requested_at), Some(ready_at)) => ready_at.saturating_duration_since(requested_at),
            _ => Duration::ZERO,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.state == TaskState::Completed && self.execution_error.is_none()
    }

    pub(crate) fn fail(&mut self, error: String) {
        self.state = TaskState::Failed;
        self.execution_error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_with_execution_error_is_not_successful() {
        let mut task = SessionTask::new(0);
        task.state = TaskState::Completed;
        assert!(task.is_successful());

        task.execution_error = Some("Failed to execute CPU command".to_string());
        assert!(!task.is_successful());
    }

    #[test]
    fn failed_task_is_not_successful() {
        let mut task = SessionTask::new(2);
        task.fail("Received empty session id from service".to_string());
        assert_eq!(TaskState::Failed, task.state);
        assert!(!task.is_successful());
        assert_eq!(3, task.number());
    }

    #[tokio::test(start_paused = true)]
    async fn time_to_ready_only_when_ready() {
        let mut task = SessionTask::new(0);
        task.requested_at = Some(Instant::now());
        assert_eq!(Duration::ZERO, task.time_to_ready());

        tokio::time::advance(Duration::from_secs(42)).await;
        task.ready_at = Some(Instant::now());
        assert_eq!(Duration::from_secs(42), task.time_to_ready());
    }
}
