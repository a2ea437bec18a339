use std::fmt::Write;

use session_stress_summary_model::{SessionSummary, UserSummary};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::orchestrator::TeardownReport;
use crate::result::UserRunResult;

#[derive(Tabled)]
struct UserRow {
    username: String,
    total: usize,
    successful: usize,
    failed: usize,
    #[tabled(display = "seconds2")]
    avg_time_to_ready_s: f64,
    #[tabled(display = "seconds2")]
    total_duration_s: f64,
}

fn seconds2(n: &f64) -> String {
    format!("{:.2}", n)
}

/// Render the human readable results of a run, covering every session and every error.
pub fn render_results(results: &[UserRunResult]) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_results(&mut out, results);
    out
}

fn write_results(out: &mut String, results: &[UserRunResult]) -> std::fmt::Result {
    writeln!(out, "\n--- Stress Test Results ---")?;

    for result in results {
        writeln!(out, "\nResults for user: {}", result.username)?;
        writeln!(out, "Total sessions: {}", result.total_sessions)?;
        writeln!(out, "Successful sessions: {}", result.successful_sessions)?;
        writeln!(out, "Failed sessions: {}", result.failed_sessions)?;
        writeln!(
            out,
            "Average time to ready: {:.2} seconds",
            result.average_time_to_ready.as_secs_f64()
        )?;
        writeln!(
            out,
            "Total duration: {:.2} seconds",
            result.total_duration.as_secs_f64()
        )?;

        if !result.errors.is_empty() {
            writeln!(out, "Errors encountered:")?;
            for error in &result.errors {
                writeln!(out, "  - {error}")?;
            }
        }

        if !result.tasks.is_empty() {
            writeln!(out, "\nDetailed session results:")?;
            for task in &result.tasks {
                writeln!(out, "  Session #{}:", task.number())?;
                if let Some(session_id) = &task.session_id {
                    writeln!(out, "    Session id: {session_id}")?;
                }
                writeln!(
                    out,
                    "    Time to ready: {:.2} seconds",
                    task.time_to_ready().as_secs_f64()
                )?;
                match &task.execution_error {
                    Some(error) => writeln!(out, "    Error: {error}")?,
                    None => writeln!(out, "    Status: Success")?,
                }
            }
        }
        writeln!(out, "{}", "-".repeat(30))?;
    }

    if !results.is_empty() {
        let rows = results
            .iter()
            .map(|r| UserRow {
                username: r.username.clone(),
                total: r.total_sessions,
                successful: r.successful_sessions,
                failed: r.failed_sessions,
                avg_time_to_ready_s: r.average_time_to_ready.as_secs_f64(),
                total_duration_s: r.total_duration.as_secs_f64(),
            })
            .collect::<Vec<_>>();
        let mut table = Table::new(rows);
        table.with(Style::modern());
        writeln!(out, "\n{table}")?;
    }

    Ok(())
}

pub fn render_teardown(report: &TeardownReport) -> String {
    if report.failures.is_empty() {
        format!(
            "\nAll {} sessions have been successfully destroyed. Test complete.",
            report.destroyed
        )
    } else {
        let mut out = format!(
            "\nTest complete, but {} of {} sessions could not be destroyed:",
            report.failures.len(),
            report.destroyed + report.failures.len()
        );
        for failure in &report.failures {
            out.push_str(&format!("\n  - {failure}"));
        }
        out
    }
}

impl From<&UserRunResult> for UserSummary {
    fn from(result: &UserRunResult) -> Self {
        UserSummary {
            username: result.username.clone(),
            total_sessions: result.total_sessions,
            successful_sessions: result.successful_sessions,
            failed_sessions: result.failed_sessions,
            average_time_to_ready_s: result.average_time_to_ready.as_secs_f64(),
            total_duration_s: result.total_duration.as_secs_f64(),
            errors: result.errors.clone(),
            sessions: result
                .tasks
                .iter()
                .map(|task| SessionSummary {
                    number: task.number(),
                    session_id: task.session_id.as_ref().map(|id| id.0.clone()),
                    time_to_ready_s: task.time_to_ready().as_secs_f64(),
                    error: task.execution_error.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DestroyError;
    use crate::task::{SessionTask, TaskState};
    use session_stress_core::prelude::SessionId;
    use std::time::Duration;

    fn sample_result() -> UserRunResult {
        let mut result = UserRunResult::new("alice".to_string(), 2);

        let mut ok = SessionTask::new(0);
        ok.session_id = Some(SessionId("abc".to_string()));
        ok.state = TaskState::Completed;
        result.record(ok);

        let mut failed = SessionTask::new(1);
        failed.fail("Received empty session id from service".to_string());
        result.record(failed);

        result.finalize(Duration::from_secs(90));
        result
    }

    #[test]
    fn results_list_every_session_and_error() {
        let text = render_results(&[sample_result()]);

        assert!(text.contains("Results for user: alice"));
        assert!(text.contains("Successful sessions: 1"));
        assert!(text.contains("Failed sessions: 1"));
        assert!(text.contains("Total duration: 90.00 seconds"));
        assert!(text.contains("  - Session 2: Received empty session id from service"));
        assert!(text.contains("  Session #1:\n    Session id: abc"));
        assert!(text.contains("    Status: Success"));
    }

    #[test]
    fn teardown_lists_failures() {
        let report = TeardownReport {
            destroyed: 2,
            failures: vec![DestroyError {
                username: "alice".to_string(),
                session_id: SessionId("abc".to_string()),
                source: anyhow::anyhow!("service unavailable"),
            }],
        };

        let text = render_teardown(&report);
        assert!(text.contains("1 of 3 sessions could not be destroyed"));
        assert!(text.contains("Failed to destroy session abc for user alice: service unavailable"));
    }

    #[test]
    fn summary_from_result() {
        let summary = UserSummary::from(&sample_result());

        assert_eq!(2, summary.sessions.len());
        assert_eq!(Some("abc".to_string()), summary.sessions[0].session_id);
        assert_eq!(None, summary.sessions[0].error);
        assert_eq!(None, summary.sessions[1].session_id);
        assert_eq!(1, summary.failed_sessions);
    }
}
