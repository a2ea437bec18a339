use std::fmt::{Display, Formatter};

use async_trait::async_trait;

/// Identifier of a user account on the session service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

/// Identifier of a provisioned session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub String);

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The operational state of a session as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationalState {
    /// The session is up and can accept commands.
    Running,
    /// The service is still finding capacity for the session. This is expected for a while after
    /// a request but a session that stays here for too long is considered stuck.
    Requested,
    /// Any other state, such as `starting` or `provisioning`. Carried through for logging.
    Other(String),
}

impl OperationalState {
    pub fn from_service(state: &str) -> Self {
        match state {
            "running" => OperationalState::Running,
            "requested" => OperationalState::Requested,
            other => OperationalState::Other(other.to_string()),
        }
    }
}

impl Display for OperationalState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationalState::Running => f.write_str("running"),
            OperationalState::Requested => f.write_str("requested"),
            OperationalState::Other(s) => f.write_str(s),
        }
    }
}

/// A single status poll result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: OperationalState,
    /// Progress towards `running`, as a percentage, if the service reports one.
    pub progress: Option<u8>,
    pub message: Option<String>,
}

impl SessionStatus {
    pub fn new(state: OperationalState) -> Self {
        Self {
            state,
            progress: None,
            message: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == OperationalState::Running
    }
}

/// The operations the stress runner needs from a session provisioning service.
///
/// Implementations are expected to apply their own request timeouts. Each call is treated as
/// atomic by the runner, with a single outcome. Retrying destroy calls is the responsibility of
/// the implementation, the runner never retries a failed destroy.
#[async_trait]
pub trait SessionService: Send + Sync + 'static {
    /// Resolve a username to the service's user id.
    async fn lookup_user(&self, username: &str) -> anyhow::Result<UserId>;

    /// Request a new session for the user from the given image.
    ///
    /// Returns `Ok(None)` if the service accepted the request but did not hand back an id.
    async fn create_session(
        &self,
        user_id: &UserId,
        image_id: &str,
    ) -> anyhow::Result<Option<SessionId>>;

    async fn poll_status(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> anyhow::Result<SessionStatus>;

    async fn exec_command(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
        command: &str,
    ) -> anyhow::Result<()>;

    async fn destroy(&self, session_id: &SessionId, user_id: &UserId) -> anyhow::Result<()>;
}
