use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use session_stress_core::prelude::{SessionService, ShutdownHandle, ShutdownSignalError};

use crate::cli::SessionCount;
use crate::error::DestroyError;
use crate::event::StatusSender;
use crate::policy::ReadyPolicy;
use crate::result::UserRunResult;
use crate::session_runner::{DestroyRoster, SessionRunner};
use crate::workload::WorkloadKind;

/// Outcome of destroying every session created during a run.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub destroyed: usize,
    pub failures: Vec<DestroyError>,
}

/// Runs one [SessionRunner] per user concurrently and keeps track of the sessions they created
/// so that they can be destroyed later.
pub struct Orchestrator<S: SessionService> {
    service: Arc<S>,
    policy: ReadyPolicy,
    image_id: String,
    status: StatusSender,
    shutdown: Option<ShutdownHandle>,
    rosters: Arc<Mutex<Vec<DestroyRoster>>>,
}

impl<S: SessionService> Orchestrator<S> {
    pub fn new(service: Arc<S>, policy: ReadyPolicy, image_id: String) -> Self {
        Self {
            service,
            policy,
            image_id,
            status: StatusSender::disabled(),
            shutdown: None,
            rosters: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Send status events for every session to the live view.
    pub fn with_status(mut self, status: StatusSender) -> Self {
        self.status = status;
        self
    }

    /// Stop every user's runner when a shutdown is signalled.
    ///
    /// Stopped users are reported as aborted, and the sessions they created up to that point are
    /// still destroyed by [Orchestrator::destroy_all].
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Stop sending status events. The live view finishes once every sender has been dropped.
    pub fn close_status(&mut self) {
        self.status = StatusSender::disabled();
    }

    /// Run sessions for every user at once and wait for all of them to finish.
    ///
    /// Returns one result per user, in the order the users were given.
    pub async fn run_all(
        &self,
        usernames: &[String],
        session_count: SessionCount,
        workload: WorkloadKind,
    ) -> Vec<UserRunResult> {
        let results = Arc::new(Mutex::new(Vec::with_capacity(usernames.len())));

        let counts = {
            let mut rng = rand::thread_rng();
            usernames
                .iter()
                .map(|_| session_count.resolve(&mut rng))
                .collect::<Vec<_>>()
        };

        let mut planned = Vec::with_capacity(usernames.len());
        let mut handles = Vec::with_capacity(usernames.len());
        for (position, (username, count)) in usernames.iter().zip(counts).enumerate() {
            log::info!("Starting {count} sessions for user {username}");
            planned.push((username.clone(), count));

            let mut runner = SessionRunner::new(
                self.service.clone(),
                self.policy.clone(),
                self.image_id.clone(),
                username.clone(),
                self.status.for_user(username),
            );
            let results = results.clone();
            let rosters = self.rosters.clone();
            let shutdown = self.shutdown.clone();
            let username = username.clone();
            handles.push(tokio::spawn(async move {
                let result = match shutdown {
                    Some(shutdown) => {
                        let mut listener = shutdown.new_listener();
                        // Listeners miss signals sent before they subscribed.
                        if shutdown.is_shutdown() {
                            interrupted(username, count)
                        } else {
                            tokio::select! {
                                result = runner.run(count, workload) => result,
                                _ = listener.wait_for_shutdown() => interrupted(username, count),
                            }
                        }
                    }
                    None => runner.run(count, workload).await,
                };
                rosters.lock().push(runner.take_roster());
                results.lock().push((position, result));
            }));
        }

        let joined = futures::future::join_all(handles).await;
        for ((position, (username, count)), outcome) in planned.into_iter().enumerate().zip(joined) {
            if let Err(e) = outcome {
                let error = format!("Runner for user {username} did not finish: {e}");
                log::error!("{error}");
                results
                    .lock()
                    .push((position, UserRunResult::aborted(username, count, error)));
            }
        }

        let mut results = std::mem::take(&mut *results.lock());
        results.sort_by_key(|(position, _)| *position);
        results.into_iter().map(|(_, result)| result).collect()
    }

    /// A copy of the sessions that are waiting to be destroyed.
    pub fn rosters(&self) -> Vec<DestroyRoster> {
        self.rosters.lock().clone()
    }

    /// Destroy every session that was created during the run, one at a time.
    ///
    /// Failures are collected and returned rather than retried. Each session is destroyed at most
    /// once, and the rosters are emptied so that calling this again does nothing.
    pub async fn destroy_all(&self) -> TeardownReport {
        let rosters = std::mem::take(&mut *self.rosters.lock());
        let mut report = TeardownReport::default();
        let mut seen = HashSet::new();

        for roster in rosters {
            let Some(user_id) = roster.user_id else {
                continue;
            };

            for session_id in roster.session_ids {
                if !seen.insert(session_id.clone()) {
                    continue;
                }

                match self.service.destroy(&session_id, &user_id).await {
                    Ok(()) => {
                        log::info!("Destroyed session {session_id} for user {}", roster.username);
                        report.destroyed += 1;
                    }
                    Err(source) => {
                        let error = DestroyError {
                            username: roster.username.clone(),
                            session_id,
                            source,
                        };
                        log::error!("{error}");
                        report.failures.push(error);
                    }
                }
            }
        }

        report
    }
}

fn interrupted(username: String, count: usize) -> UserRunResult {
    log::warn!("Stopping sessions for user {username}");
    UserRunResult::aborted(username, count, ShutdownSignalError::default())
}
