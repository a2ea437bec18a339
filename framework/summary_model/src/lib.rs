use serde::{Deserialize, Serialize};
use std::io::{BufRead, Read, Write};
use std::path::Path;

/// Summary of a stress run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The workload that was executed in each session, `cpu`, `network` or `all`
    pub workload: String,
    /// The image that sessions were requested from
    pub image_id: String,
    /// One entry per user that took part in the run
    pub users: Vec<UserSummary>,
    /// Sessions that could not be destroyed during teardown
    ///
    /// Empty if teardown was skipped or every destroy succeeded.
    #[serde(default)]
    pub destroy_failures: Vec<String>,
    /// The version of the stress tester that produced this summary
    pub version: String,
}

/// Outcome of all sessions for one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub username: String,
    pub total_sessions: usize,
    pub successful_sessions: usize,
    pub failed_sessions: usize,
    /// Mean time from request to ready across all sessions, in seconds
    pub average_time_to_ready_s: f64,
    /// Wall clock time for the user's whole run, in seconds
    pub total_duration_s: f64,
    pub errors: Vec<String>,
    pub sessions: Vec<SessionSummary>,
}

/// Outcome of a single session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    /// 1-based session number within the user's run
    pub number: usize,
    /// Not set if the session could not be created
    pub session_id: Option<String>,
    pub time_to_ready_s: f64,
    /// Not set if the session completed successfully
    pub error: Option<String>,
}

impl RunSummary {
    pub fn new(
        run_id: String,
        started_at: i64,
        workload: String,
        image_id: String,
        version: String,
    ) -> Self {
        Self {
            run_id,
            started_at,
            workload,
            image_id,
            users: Vec::new(),
            destroy_failures: Vec::new(),
            version,
        }
    }

    pub fn add_user(&mut self, user: UserSummary) {
        self.users.push(user);
    }

    pub fn set_destroy_failures(&mut self, failures: Vec<String>) {
        self.destroy_failures = failures;
    }

    pub fn total_sessions(&self) -> usize {
        self.users.iter().map(|u| u.total_sessions).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.users.iter().map(|u| u.failed_sessions).sum()
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary].
pub fn load_summary_runs(path: impl AsRef<Path>) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_summary(run_id: &str) -> RunSummary {
        let mut summary = RunSummary::new(
            run_id.to_string(),
            1_700_000_000,
            "all".to_string(),
            "image-1".to_string(),
            "0.1.0".to_string(),
        );
        summary.add_user(UserSummary {
            username: "alice".to_string(),
            total_sessions: 2,
            successful_sessions: 1,
            failed_sessions: 1,
            average_time_to_ready_s: 12.5,
            total_duration_s: 60.0,
            errors: vec!["Session 2: received empty session id from service".to_string()],
            sessions: vec![
                SessionSummary {
                    number: 1,
                    session_id: Some("abc".to_string()),
                    time_to_ready_s: 25.0,
                    error: None,
                },
                SessionSummary {
                    number: 2,
                    session_id: None,
                    time_to_ready_s: 0.0,
                    error: Some("received empty session id from service".to_string()),
                },
            ],
        });
        summary
    }

    #[test]
    fn totals_across_users() {
        let summary = sample_summary("run");
        assert_eq!(2, summary.total_sessions());
        assert_eq!(1, summary.total_failed());
    }

    #[test]
    fn append_then_load_all_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.jsonl");

        append_run_summary(&sample_summary("first"), &path).unwrap();
        append_run_summary(&sample_summary("second"), &path).unwrap();

        let runs = load_summary_runs(&path).unwrap();
        assert_eq!(2, runs.len());
        assert_eq!(sample_summary("first"), runs[0]);
        assert_eq!("second", runs[1].run_id);
    }

    #[test]
    fn missing_destroy_failures_defaults_to_empty() {
        let mut value = serde_json::to_value(sample_summary("run")).unwrap();
        value.as_object_mut().unwrap().remove("destroy_failures");

        let loaded = load_run_summary(value.to_string().as_bytes()).unwrap();
        assert!(loaded.destroy_failures.is_empty());
    }
}
