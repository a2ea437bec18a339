use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use rand::Rng;

use crate::workload::WorkloadKind;

#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct StressCli {
    /// A user to run sessions for. Specify the flag multiple times to run users concurrently,
    /// for example `-u alice -u bob`.
    #[clap(short = 'u', long = "username", required_unless_present = "list_images")]
    pub usernames: Vec<String>,

    /// The number of sessions to start for each user.
    ///
    /// Either a fixed count such as `5`, or a range such as `2-6` in which case each user is
    /// assigned a random count from the range, inclusive.
    #[clap(short = 'n', long = "sessions", value_parser = parse_session_count, required_unless_present = "list_images")]
    pub sessions: Option<SessionCount>,

    /// The workload to execute in each session once it is ready.
    #[clap(short = 'c', long = "workload", value_enum, default_value_t = WorkloadKind::All)]
    pub workload: WorkloadKind,

    /// Path to a JSON config file. Defaults to `~/.kasm-stress-test.json`.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Where to write the log file. Defaults to `stress-test.log` next to the executable.
    #[clap(long)]
    pub log_file: Option<PathBuf>,

    /// Do not draw the live status view, log status changes instead.
    ///
    /// This is recommended for CI/CD environments where nobody is watching the terminal.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Append a JSON summary of the run to this file, one run per line.
    #[clap(long)]
    pub summary_file: Option<PathBuf>,

    /// Destroy sessions at the end of the run without asking for confirmation.
    #[clap(short = 'y', long, default_value = "false")]
    pub yes: bool,

    /// List the images available to the configured API key and exit.
    #[clap(long, default_value = "false")]
    pub list_images: bool,
}

/// How many sessions each user should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCount {
    Fixed(usize),
    Range { min: usize, max: usize },
}

impl SessionCount {
    /// Pick the session count for one user.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        match *self {
            SessionCount::Fixed(n) => n,
            SessionCount::Range { min, max } => rng.gen_range(min..=max),
        }
    }
}

impl FromStr for SessionCount {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((min, max)) => {
                let min = min
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| anyhow::anyhow!("Invalid minimum in session range '{s}': {e}"))?;
                let max = max
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| anyhow::anyhow!("Invalid maximum in session range '{s}': {e}"))?;
                if min > max {
                    anyhow::bail!("Session range '{s}' has a minimum greater than its maximum");
                }
                Ok(SessionCount::Range { min, max })
            }
            None => s
                .trim()
                .parse::<usize>()
                .map(SessionCount::Fixed)
                .map_err(|e| anyhow::anyhow!("Invalid session count '{s}': {e}")),
        }
    }
}

fn parse_session_count(s: &str) -> anyhow::Result<SessionCount> {
    s.parse()
}
