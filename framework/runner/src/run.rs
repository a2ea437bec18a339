use std::sync::Arc;

use anyhow::Context;
use session_stress_core::prelude::{SessionService, ShutdownSignalError};
use session_stress_instruments::Reporter;
use session_stress_summary_model::{append_run_summary, RunSummary};

use crate::definition::{RunDefinition, RunDefinitionBuilder};
use crate::event::status_channel;
use crate::executor::Executor;
use crate::live_view::{run_live_view, LogOutput, TerminalOutput, DEFAULT_TICK};
use crate::orchestrator::{Orchestrator, TeardownReport};
use crate::report::{render_results, render_teardown};
use crate::result::UserRunResult;
use crate::shutdown::start_shutdown_listener;

/// Everything that happened during a stress run.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub results: Vec<UserRunResult>,
    pub teardown: TeardownReport,
    /// The run was stopped early with Ctrl-C.
    pub interrupted: bool,
}

/// Run a stress test against `service` and destroy every session it created.
///
/// Session failures are reported rather than returned as errors, and so is a summary file that
/// could not be written. An error is only returned if the run could not be set up.
pub fn run<S: SessionService>(
    definition: RunDefinitionBuilder,
    service: Arc<S>,
    reporter: Arc<Reporter>,
) -> anyhow::Result<RunOutcome> {
    let definition = definition.build()?;
    let run_id = nanoid::nanoid!();
    let started_at = chrono::Utc::now();

    log::info!(
        "Starting stress run {run_id} for users [{}], {} workload on image {}",
        definition.usernames.join(", "),
        definition.workload,
        definition.image_id
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);
    let executor = Executor::new(runtime, shutdown_handle.clone());

    let (status, receiver) = status_channel();
    let view = if definition.live_view {
        executor.spawn(run_live_view(
            receiver,
            shutdown_handle.new_listener(),
            TerminalOutput::new(),
            DEFAULT_TICK,
        ))
    } else {
        executor.spawn(run_live_view(
            receiver,
            shutdown_handle.new_listener(),
            LogOutput,
            DEFAULT_TICK,
        ))
    };

    let mut orchestrator = Orchestrator::new(
        service,
        definition.policy.clone(),
        definition.image_id.clone(),
    )
    .with_status(status)
    .with_shutdown(shutdown_handle.clone());

    let results = executor.block_on(orchestrator.run_all(
        &definition.usernames,
        definition.session_count,
        definition.workload,
    ));

    // The view finishes once the last sender is gone.
    orchestrator.close_status();
    if let Err(e) = executor.join(view) {
        log::warn!("Live view did not finish cleanly: {e:?}");
    }

    let interrupted = shutdown_handle.is_shutdown();
    println!("{}", render_results(&results));

    let pending: usize = orchestrator
        .rosters()
        .iter()
        .map(|roster| roster.session_ids.len())
        .sum();
    let teardown = if pending == 0 {
        println!("\nNo sessions to destroy. Test complete.");
        TeardownReport::default()
    } else {
        if !definition.auto_confirm && !interrupted {
            wait_for_confirmation(&executor, pending);
        }
        println!("\nDestroying {pending} sessions...");
        let teardown = executor.block_on(orchestrator.destroy_all());
        println!("{}", render_teardown(&teardown));
        teardown
    };

    reporter.finalize();

    if let Some(path) = &definition.summary_file {
        let summary = build_run_summary(
            run_id.clone(),
            started_at.timestamp(),
            &definition,
            &results,
            &teardown,
        );
        match append_run_summary(&summary, path) {
            Ok(()) => log::info!("Wrote summary of run {run_id} to {}", path.display()),
            Err(e) => log::error!("Failed to write run summary to {}: {e:#}", path.display()),
        }
    }

    Ok(RunOutcome {
        run_id,
        results,
        teardown,
        interrupted,
    })
}

/// Block until the user presses Enter. Returns early if the run is interrupted, in which case
/// teardown goes ahead without confirmation.
fn wait_for_confirmation(executor: &Executor, pending: usize) {
    println!("\nPress Enter to destroy all {pending} sessions...");

    let (tx, rx) = tokio::sync::oneshot::channel();
    // Reading stdin cannot be cancelled, so it gets its own thread which is left behind if the
    // user presses Ctrl-C instead.
    let spawned = std::thread::Builder::new()
        .name("teardown-confirmation".to_string())
        .spawn(move || {
            let mut line = String::new();
            let _ = tx.send(std::io::stdin().read_line(&mut line));
        });
    if let Err(e) = spawned {
        log::error!("Failed to wait for confirmation, destroying sessions now: {e:?}");
        return;
    }

    let confirmed = executor.execute_in_place(async move {
        rx.await
            .context("Confirmation reader stopped")?
            .context("Failed to read confirmation")?;
        Ok(())
    });
    match confirmed {
        Ok(()) => {}
        Err(e) if e.is::<ShutdownSignalError>() => {
            log::warn!("Interrupted while waiting for confirmation, destroying sessions now");
        }
        Err(e) => log::error!("{e:#}, destroying sessions now"),
    }
}

fn build_run_summary(
    run_id: String,
    started_at: i64,
    definition: &RunDefinition,
    results: &[UserRunResult],
    teardown: &TeardownReport,
) -> RunSummary {
    let mut summary = RunSummary::new(
        run_id,
        started_at,
        definition.workload.to_string(),
        definition.image_id.clone(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    for result in results {
        summary.add_user(result.into());
    }
    summary.set_destroy_failures(teardown.failures.iter().map(|f| f.to_string()).collect());
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SessionCount;
    use crate::error::DestroyError;
    use session_stress_core::prelude::SessionId;
    use std::time::Duration;

    #[test]
    fn summary_covers_users_and_destroy_failures() {
        let definition = RunDefinitionBuilder::new()
            .with_user("alice")
            .with_session_count(SessionCount::Fixed(1))
            .with_image_id("img-1")
            .build()
            .unwrap();

        let mut result = UserRunResult::new("alice".to_string(), 0);
        result.finalize(Duration::from_secs(1));

        let teardown = TeardownReport {
            destroyed: 0,
            failures: vec![DestroyError {
                username: "alice".to_string(),
                session_id: SessionId("abc".to_string()),
                source: anyhow::anyhow!("gone"),
            }],
        };

        let summary = build_run_summary(
            "run-1".to_string(),
            1_700_000_000,
            &definition,
            &[result],
            &teardown,
        );

        assert_eq!("all", summary.workload);
        assert_eq!("img-1", summary.image_id);
        assert_eq!(1, summary.users.len());
        assert_eq!(
            vec!["Failed to destroy session abc for user alice: gone".to_string()],
            summary.destroy_failures
        );
    }
}
