use std::future::Future;

use session_stress_core::prelude::{ShutdownHandle, ShutdownSignalError};
use tokio::task::JoinHandle;

/// Owns the async runtime for a stress run.
#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub fn new(runtime: tokio::runtime::Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// The future is cancelled if a shutdown is signalled, in which case a [ShutdownSignalError]
    /// is returned.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        if self.shutdown_handle.is_shutdown() {
            return Err(ShutdownSignalError::default().into());
        }
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                },
            }
        })
    }

    /// Run async code in place, blocking until it completes, whether or not a shutdown is
    /// signalled.
    ///
    /// For work that must finish, like destroying sessions, or work that handles shutdown itself.
    pub fn block_on<T>(&self, fut: impl Future<Output = T>) -> T {
        self.runtime.block_on(fut)
    }

    /// Submit async code to be run in the background.
    pub fn spawn<T: Send + 'static>(
        &self,
        fut: impl Future<Output = T> + Send + 'static,
    ) -> JoinHandle<T> {
        self.runtime.spawn(fut)
    }

    /// Wait for background work started with [Executor::spawn].
    pub fn join<T>(&self, handle: JoinHandle<T>) -> anyhow::Result<T> {
        self.runtime
            .block_on(handle)
            .map_err(|e| anyhow::anyhow!("Background task failed: {e:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> (Executor, ShutdownHandle) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let shutdown = ShutdownHandle::new();
        (Executor::new(runtime, shutdown.clone()), shutdown)
    }

    #[test]
    fn execute_in_place_returns_result() {
        let (executor, _shutdown) = executor();
        let value = executor.execute_in_place(async { Ok(5) }).unwrap();
        assert_eq!(5, value);
    }

    #[test]
    fn execute_in_place_is_cancelled_by_shutdown() {
        let (executor, handle) = executor();

        let result = executor.execute_in_place(async move {
            handle.shutdown();
            std::future::pending::<()>().await;
            Ok(())
        });

        let err = result.unwrap_err();
        assert!(err.is::<ShutdownSignalError>());
    }

    #[test]
    fn execute_in_place_refuses_work_after_shutdown() {
        let (executor, shutdown) = executor();
        shutdown.shutdown();

        let result = executor.execute_in_place(async { Ok("never waited for") });

        assert!(result.unwrap_err().is::<ShutdownSignalError>());
    }

    #[test]
    fn block_on_ignores_shutdown() {
        let (executor, shutdown) = executor();
        shutdown.shutdown();

        let value = executor.block_on(async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            "finished"
        });
        assert_eq!("finished", value);
    }

    #[test]
    fn spawn_and_join() {
        let (executor, _shutdown) = executor();
        let handle = executor.spawn(async { "done" });
        assert_eq!("done", executor.join(handle).unwrap());
    }
}
