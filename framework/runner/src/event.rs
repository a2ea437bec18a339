use std::time::Duration;

use tokio::sync::mpsc;

use crate::task::TaskState;

/// Capacity of the channel between session runners and the live view.
pub const STATUS_CHANNEL_CAPACITY: usize = 1024;

/// A status transition for one session. The only data that flows from the runners to the live
/// view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub username: String,
    /// 0-based session index within the user's run.
    pub session_index: usize,
    pub state: TaskState,
    /// Time since the runner started working on this session index.
    pub elapsed: Duration,
}

pub fn status_channel() -> (StatusSender, mpsc::Receiver<StatusEvent>) {
    let (tx, rx) = mpsc::channel(STATUS_CHANNEL_CAPACITY);
    (StatusSender { tx: Some(tx) }, rx)
}

/// Cloneable producer side of the status channel.
#[derive(Debug, Clone, Default)]
pub struct StatusSender {
    tx: Option<mpsc::Sender<StatusEvent>>,
}

impl StatusSender {
    /// A sender that drops every event, for runs without a live view.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Bind this sender to a user so every event it sends is attributed to them.
    pub fn for_user(&self, username: &str) -> UserStatusSender {
        UserStatusSender {
            username: username.to_string(),
            sender: self.clone(),
        }
    }

    async fn send(&self, event: StatusEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).await.is_err() {
                log::trace!("Status view has stopped, dropping status event");
            }
        }
    }
}

/// A [StatusSender] bound to one user.
#[derive(Debug, Clone)]
pub struct UserStatusSender {
    username: String,
    sender: StatusSender,
}

impl UserStatusSender {
    pub async fn emit(&self, session_index: usize, state: TaskState, elapsed: Duration) {
        self.sender
            .send(StatusEvent {
                username: self.username.clone(),
                session_index,
                state,
                elapsed,
            })
            .await;
    }
}
