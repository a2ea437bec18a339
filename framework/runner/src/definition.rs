use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Context;

use crate::cli::{SessionCount, StressCli};
use crate::policy::ReadyPolicy;
use crate::workload::WorkloadKind;

/// The builder for a stress run definition.
///
/// Start from the command line with [RunDefinitionBuilder::from_cli] and then add the values that
/// come from configuration, like the image to launch.
#[derive(Debug, Clone)]
pub struct RunDefinitionBuilder {
    /// The users to start sessions for. Each user is run concurrently with the others.
    usernames: Vec<String>,
    /// How many sessions each user should start, one after another.
    session_count: Option<SessionCount>,
    workload: WorkloadKind,
    /// The image that every session is launched from.
    image_id: Option<String>,
    policy: ReadyPolicy,
    /// Draw the live status view. When disabled, status changes are logged instead.
    live_view: bool,
    /// Append a JSON summary of the run to this file.
    summary_file: Option<PathBuf>,
    /// Destroy sessions at the end of the run without waiting for the user to confirm.
    auto_confirm: bool,
}

/// A validated stress run definition, ready to be passed to [crate::run::run].
#[derive(Debug, Clone)]
pub struct RunDefinition {
    pub usernames: Vec<String>,
    pub session_count: SessionCount,
    pub workload: WorkloadKind,
    pub image_id: String,
    pub policy: ReadyPolicy,
    pub live_view: bool,
    pub summary_file: Option<PathBuf>,
    pub auto_confirm: bool,
}

impl Default for RunDefinitionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RunDefinitionBuilder {
    pub fn new() -> Self {
        Self {
            usernames: Vec::new(),
            session_count: None,
            workload: WorkloadKind::All,
            image_id: None,
            policy: ReadyPolicy::default(),
            live_view: true,
            summary_file: None,
            auto_confirm: false,
        }
    }

    /// Initialise a run definition from the command line arguments.
    pub fn from_cli(cli: &StressCli) -> Self {
        Self {
            usernames: cli.usernames.clone(),
            session_count: cli.sessions,
            workload: cli.workload,
            image_id: None,
            policy: ReadyPolicy::default(),
            live_view: !cli.no_progress,
            summary_file: cli.summary_file.clone(),
            auto_confirm: cli.yes,
        }
    }

    pub fn with_user(mut self, username: impl Into<String>) -> Self {
        self.usernames.push(username.into());
        self
    }

    pub fn with_session_count(mut self, session_count: SessionCount) -> Self {
        self.session_count = Some(session_count);
        self
    }

    pub fn with_workload(mut self, workload: WorkloadKind) -> Self {
        self.workload = workload;
        self
    }

    pub fn with_image_id(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }

    pub fn with_policy(mut self, policy: ReadyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_live_view(mut self, live_view: bool) -> Self {
        self.live_view = live_view;
        self
    }

    pub fn with_summary_file(mut self, summary_file: impl Into<PathBuf>) -> Self {
        self.summary_file = Some(summary_file.into());
        self
    }

    pub fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    pub(crate) fn build(self) -> anyhow::Result<RunDefinition> {
        if self.usernames.is_empty() {
            anyhow::bail!("At least one username is required");
        }
        if let Some(empty) = self.usernames.iter().find(|u| u.trim().is_empty()) {
            anyhow::bail!("Invalid username: {empty:?}");
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = self.usernames.iter().find(|u| !seen.insert(u.as_str())) {
            anyhow::bail!("Username {duplicate:?} was given more than once");
        }

        let session_count = self
            .session_count
            .context("The number of sessions per user is required")?;
        if let SessionCount::Range { min, max } = session_count {
            if min > max {
                anyhow::bail!("Invalid session range {min}-{max}: min must not be greater than max");
            }
        }

        let image_id = self
            .image_id
            .filter(|id| !id.trim().is_empty())
            .context("An image id is required to launch sessions")?;

        Ok(RunDefinition {
            usernames: self.usernames,
            session_count,
            workload: self.workload,
            image_id,
            policy: self.policy,
            live_view: self.live_view,
            summary_file: self.summary_file,
            auto_confirm: self.auto_confirm,
        })
    }
}
