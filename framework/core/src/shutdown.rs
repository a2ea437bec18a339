use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};
use tokio::sync::Mutex;

/// Broadcasts a one-off shutdown signal to every listener created from it.
///
/// The stress run uses this to stop background work, like the live status view, when the user
/// presses Ctrl-C or the run is complete.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<()>,
    signalled: Arc<AtomicBool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
            signalled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown(&self) {
        self.signalled.store(true, Ordering::SeqCst);
        if let Err(e) = self.sender.send(()) {
            // Nobody is listening, which is fine once background tasks have already finished.
            log::debug!("No listeners for shutdown signal: {e:?}");
        }
    }

    /// Whether [ShutdownHandle::shutdown] has been called on this handle or any of its clones.
    ///
    /// Listeners only see signals sent after they were created, so check this before waiting on
    /// a listener created late in the run.
    pub fn is_shutdown(&self) -> bool {
        self.signalled.load(Ordering::SeqCst)
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Arc<Mutex<Receiver<()>>>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<()>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Wait until the shutdown signal is received, or every [ShutdownHandle] has been dropped.
    ///
    /// Safe to race against other futures with `tokio::select!`.
    pub async fn wait_for_shutdown(&mut self) {
        let mut receiver = self.receiver.lock().await;
        loop {
            match receiver.recv().await {
                Ok(()) | Err(RecvError::Closed) => return,
                Err(RecvError::Lagged(_)) => continue,
            }
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Stress run interrupted by shutdown signal".to_string(),
        }
    }
}
