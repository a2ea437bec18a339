use session_stress_core::prelude::ShutdownHandle;
use tokio::signal;

/// Signal shutdown when the user presses Ctrl-C.
///
/// The first Ctrl-C stops the run so that the sessions created so far can be destroyed. A second
/// Ctrl-C exits immediately, leaving any remaining sessions behind.
pub(crate) fn start_shutdown_listener(runtime: &tokio::runtime::Runtime) -> ShutdownHandle {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e:?}");
            return;
        }
        log::warn!("Received Ctrl-C, stopping the stress run. Press Ctrl-C again to exit now.");
        listener_handle.shutdown();

        if signal::ctrl_c().await.is_ok() {
            log::error!("Received second Ctrl-C, exiting without destroying sessions");
            std::process::exit(130);
        }
    });

    handle
}
