#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use session_stress_core::prelude::{
    OperationalState, SessionId, SessionService, SessionStatus, UserId,
};

/// What the next call to `create_session` should return.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    /// A fresh, unique session id.
    Fresh,
    /// A specific session id, to simulate a service handing out the same id twice.
    Id(&'static str),
    Empty,
    Error(&'static str),
}

type StatusFn = Box<dyn Fn(&SessionId, usize) -> anyhow::Result<SessionStatus> + Send + Sync>;

/// Everything the fake service was asked to do.
#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub created: Vec<SessionId>,
    pub destroyed: Vec<SessionId>,
    pub executed: Vec<(SessionId, String)>,
    pub polls: HashMap<SessionId, usize>,
}

/// A scripted [SessionService] that never touches the network.
pub struct FakeService {
    unknown_users: HashSet<String>,
    create_script: Mutex<VecDeque<CreateOutcome>>,
    status: StatusFn,
    failing_commands: bool,
    failing_destroys: HashSet<String>,
    next_id: AtomicUsize,
    calls: Mutex<Calls>,
}

impl Default for FakeService {
    fn default() -> Self {
        Self {
            unknown_users: HashSet::new(),
            create_script: Mutex::new(VecDeque::new()),
            status: Box::new(|_, _| Ok(SessionStatus::new(OperationalState::Running))),
            failing_commands: false,
            failing_destroys: HashSet::new(),
            next_id: AtomicUsize::new(1),
            calls: Mutex::new(Calls::default()),
        }
    }
}

impl FakeService {
    pub fn with_unknown_user(mut self, username: &str) -> Self {
        self.unknown_users.insert(username.to_string());
        self
    }

    /// Outcomes for the next calls to `create_session`, in order. Once used up, every session
    /// gets a fresh id.
    pub fn with_creates(self, outcomes: Vec<CreateOutcome>) -> Self {
        *self.create_script.lock() = outcomes.into();
        self
    }

    /// Decide the status of a session from its id and how many times it has been polled before.
    pub fn with_status(
        mut self,
        status: impl Fn(&SessionId, usize) -> anyhow::Result<SessionStatus> + Send + Sync + 'static,
    ) -> Self {
        self.status = Box::new(status);
        self
    }

    pub fn with_failing_commands(mut self) -> Self {
        self.failing_commands = true;
        self
    }

    pub fn with_failing_destroy(mut self, session_id: &str) -> Self {
        self.failing_destroys.insert(session_id.to_string());
        self
    }

    pub fn calls(&self) -> Calls {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SessionService for FakeService {
    async fn lookup_user(&self, username: &str) -> anyhow::Result<UserId> {
        if self.unknown_users.contains(username) {
            anyhow::bail!("user {username} not found");
        }
        Ok(UserId(format!("id-{username}")))
    }

    async fn create_session(
        &self,
        _user_id: &UserId,
        _image_id: &str,
    ) -> anyhow::Result<Option<SessionId>> {
        let outcome = self
            .create_script
            .lock()
            .pop_front()
            .unwrap_or(CreateOutcome::Fresh);

        let session_id = match outcome {
            CreateOutcome::Fresh => {
                SessionId(format!("kasm-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
            }
            CreateOutcome::Id(id) => SessionId(id.to_string()),
            CreateOutcome::Empty => return Ok(Some(SessionId(String::new()))),
            CreateOutcome::Error(msg) => anyhow::bail!("{msg}"),
        };
        self.calls.lock().created.push(session_id.clone());
        Ok(Some(session_id))
    }

    async fn poll_status(
        &self,
        session_id: &SessionId,
        _user_id: &UserId,
    ) -> anyhow::Result<SessionStatus> {
        let previous_polls = {
            let mut calls = self.calls.lock();
            let count = calls.polls.entry(session_id.clone()).or_default();
            *count += 1;
            *count - 1
        };
        (self.status)(session_id, previous_polls)
    }

    async fn exec_command(
        &self,
        session_id: &SessionId,
        _user_id: &UserId,
        command: &str,
    ) -> anyhow::Result<()> {
        self.calls
            .lock()
            .executed
            .push((session_id.clone(), command.to_string()));
        if self.failing_commands {
            anyhow::bail!("exit code 1");
        }
        Ok(())
    }

    async fn destroy(&self, session_id: &SessionId, _user_id: &UserId) -> anyhow::Result<()> {
        self.calls.lock().destroyed.push(session_id.clone());
        if self.failing_destroys.contains(&session_id.0) {
            anyhow::bail!("service unavailable");
        }
        Ok(())
    }
}
