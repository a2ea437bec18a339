use std::sync::Arc;
use std::time::Duration;

use session_stress_core::prelude::{OperationalState, SessionId, SessionService, UserId};
use tokio::time::Instant;

use crate::error::{SessionFailure, UserLookupError};
use crate::event::UserStatusSender;
use crate::policy::ReadyPolicy;
use crate::result::UserRunResult;
use crate::task::{SessionTask, TaskState};
use crate::workload::WorkloadKind;

/// A resolved user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub user_id: UserId,
}

/// The sessions a runner created, which must be destroyed at teardown.
///
/// Only sessions that the service handed back an id for are ever added.
#[derive(Debug, Clone)]
pub struct DestroyRoster {
    pub username: String,
    pub user_id: Option<UserId>,
    pub session_ids: Vec<SessionId>,
}

impl DestroyRoster {
    fn new(username: String) -> Self {
        Self {
            username,
            user_id: None,
            session_ids: Vec::new(),
        }
    }
}

/// Drives one user's sessions through request, ready, execute and finalize, one session at a time.
pub struct SessionRunner<S: SessionService> {
    service: Arc<S>,
    policy: ReadyPolicy,
    image_id: String,
    username: String,
    status: UserStatusSender,
    roster: DestroyRoster,
}

impl<S: SessionService> SessionRunner<S> {
    pub fn new(
        service: Arc<S>,
        policy: ReadyPolicy,
        image_id: String,
        username: String,
        status: UserStatusSender,
    ) -> Self {
        Self {
            service,
            policy,
            image_id,
            roster: DestroyRoster::new(username.clone()),
            username,
            status,
        }
    }

    /// Run `session_count` sessions for this runner's user.
    ///
    /// Only a failure to resolve the user stops the run early. Every other failure is recorded
    /// against its session and the runner moves on to the next one.
    pub async fn run(&mut self, session_count: usize, workload: WorkloadKind) -> UserRunResult {
        let started_at = Instant::now();

        // Every planned session is visible from the start, not only once it is reached.
        for index in 0..session_count {
            self.status.emit(index, TaskState::Pending, Duration::ZERO).await;
        }

        let user = match self.resolve_user().await {
            Ok(user) => user,
            Err(e) => {
                log::error!("{e}");
                for index in 0..session_count {
                    self.status
                        .emit(index, TaskState::Failed, started_at.elapsed())
                        .await;
                }
                let mut result =
                    UserRunResult::lookup_failed(self.username.clone(), session_count, &e);
                result.finalize(started_at.elapsed());
                return result;
            }
        };
        self.roster.user_id = Some(user.user_id.clone());

        let mut result = UserRunResult::new(self.username.clone(), session_count);
        for index in 0..session_count {
            let task = self.run_session(&user, index, workload).await;
            result.record(task);
        }

        result.finalize(started_at.elapsed());
        log::info!(
            "Finished {} sessions for user {}: {} successful, {} failed",
            result.total_sessions,
            self.username,
            result.successful_sessions,
            result.failed_sessions
        );
        result
    }

    /// Hand over the sessions to destroy. Leaves the runner with an empty roster.
    ///
    /// Sessions are added to the roster as soon as the service hands back their id, so the
    /// roster is complete even if [SessionRunner::run] was cancelled part way through.
    pub fn take_roster(&mut self) -> DestroyRoster {
        let empty = DestroyRoster {
            username: self.username.clone(),
            user_id: self.roster.user_id.clone(),
            session_ids: Vec::new(),
        };
        std::mem::replace(&mut self.roster, empty)
    }

    async fn resolve_user(&self) -> Result<User, UserLookupError> {
        self.service
            .lookup_user(&self.username)
            .await
            .map(|user_id| User {
                username: self.username.clone(),
                user_id,
            })
            .map_err(|source| UserLookupError {
                username: self.username.clone(),
                source,
            })
    }

    async fn run_session(
        &mut self,
        user: &User,
        index: usize,
        workload: WorkloadKind,
    ) -> SessionTask {
        log::info!("Starting session {} for user {}", index + 1, user.username);
        let started_at = Instant::now();
        let mut task = SessionTask::new(index);

        let mut stuck_retries_left = self.policy.stuck_retries;
        let session_id = loop {
            task.state = TaskState::Requesting;
            task.session_id = None;
            task.requested_at = Some(Instant::now());
            self.emit(&task, started_at).await;

            let session_id = match self.request_session(user).await {
                Ok(session_id) => session_id,
                Err(e) => {
                    log::error!("Session {} for user {}: {e}", index + 1, user.username);
                    task.fail(e.to_string());
                    self.emit(&task, started_at).await;
                    return task;
                }
            };
            task.session_id = Some(session_id.clone());
            self.roster.session_ids.push(session_id.clone());

            task.state = TaskState::Waiting;
            match self.wait_for_ready(&task, &session_id, user, started_at).await {
                Ok(()) => break session_id,
                Err(e) if e.is_stuck_requested() && stuck_retries_left > 0 => {
                    stuck_retries_left -= 1;
                    log::error!("{e}. Destroying it and requesting a new session.");
                    match self.service.destroy(&session_id, &user.user_id).await {
                        Ok(()) => self.roster.session_ids.retain(|id| id != &session_id),
                        Err(destroy_err) => {
                            // Left on the roster so teardown tries again.
                            log::error!(
                                "Failed to destroy stuck session {session_id}: {destroy_err:#}"
                            );
                        }
                    }
                    task.session_id = None;
                    log::info!(
                        "Waiting {:?} for the session pool to catch up before retrying session {} for user {}",
                        self.policy.stuck_cooldown,
                        index + 1,
                        user.username
                    );
                    tokio::time::sleep(self.policy.stuck_cooldown).await;
                }
                Err(e) => {
                    log::error!("Failed waiting for session {session_id} to be ready: {e}");
                    task.fail(e.to_string());
                    self.emit(&task, started_at).await;
                    return task;
                }
            }
        };
        task.ready_at = Some(Instant::now());

        task.state = TaskState::Executing;
        self.emit(&task, started_at).await;
        task.execution_error = self.execute_workload(&session_id, user, workload).await;

        task.state = TaskState::Completed;
        self.emit(&task, started_at).await;
        log::info!("Completed session {} for user {}", index + 1, user.username);
        task
    }

    async fn request_session(&self, user: &User) -> Result<SessionId, SessionFailure> {
        log::info!("Requesting session for user {}", user.username);
        match self
            .service
            .create_session(&user.user_id, &self.image_id)
            .await
        {
            Ok(Some(session_id)) if !session_id.0.is_empty() => {
                log::info!("Created session {session_id} for user {}", user.username);
                Ok(session_id)
            }
            Ok(_) => Err(SessionFailure::EmptySessionId),
            Err(e) => Err(SessionFailure::Create(e)),
        }
    }

    /// Poll until the session is running, it is stuck in the requested state or the ready
    /// timeout passes, whichever comes first.
    async fn wait_for_ready(
        &self,
        task: &SessionTask,
        session_id: &SessionId,
        user: &User,
        started_at: Instant,
    ) -> Result<(), SessionFailure> {
        let wait_started = Instant::now();
        let mut requested_since: Option<Instant> = None;
        let mut last_error = None;

        loop {
            self.emit(task, started_at).await;

            match self.service.poll_status(session_id, &user.user_id).await {
                Ok(status) if status.is_running() => {
                    log::info!("Session {session_id} is running after {:?}", wait_started.elapsed());
                    return Ok(());
                }
                Ok(status) => {
                    if status.state == OperationalState::Requested {
                        let since = *requested_since.get_or_insert_with(Instant::now);
                        if since.elapsed() >= self.policy.stuck_threshold {
                            return Err(SessionFailure::StuckRequested {
                                session_id: session_id.clone(),
                                threshold: self.policy.stuck_threshold,
                            });
                        }
                        log::info!("Session {session_id} is still in requested state. Waiting...");
                    } else {
                        requested_since = None;
                        log::info!(
                            "Session {session_id} status: {}{}. Waiting... ({:?})",
                            status.state,
                            status.progress.map(|p| format!(" {p}%")).unwrap_or_default(),
                            wait_started.elapsed()
                        );
                    }
                }
                Err(e) => {
                    log::warn!("Failed to get status for session {session_id}: {e:#}");
                    last_error = Some(format!("{e:#}"));
                }
            }

            if wait_started.elapsed() >= self.policy.ready_timeout {
                return Err(SessionFailure::ReadyTimeout {
                    session_id: session_id.clone(),
                    waited: wait_started.elapsed(),
                    last_error,
                });
            }

            tokio::time::sleep(self.policy.poll_interval).await;
        }
    }

    /// Run every command for the workload, even if an earlier one fails. Returns the combined
    /// error message if any command failed.
    async fn execute_workload(
        &self,
        session_id: &SessionId,
        user: &User,
        workload: WorkloadKind,
    ) -> Option<String> {
        let mut errors = Vec::new();
        for command in workload.commands() {
            log::info!("Executing {} command on session {session_id}", command.name);
            match self
                .service
                .exec_command(session_id, &user.user_id, command.command)
                .await
            {
                Ok(()) => log::info!("{} command executed on session {session_id}", command.name),
                Err(e) => {
                    log::error!(
                        "Failed to execute {} command on session {session_id}: {e:#}",
                        command.name
                    );
                    errors.push(format!("Failed to execute {} command: {e:#}", command.name));
                }
            }
        }

        if errors.is_empty() {
            None
        } else {
            Some(errors.join(" "))
        }
    }

    async fn emit(&self, task: &SessionTask, started_at: Instant) {
        self.status
            .emit(task.index, task.state, started_at.elapsed())
            .await;
    }
}
