mod cli;
mod definition;
mod error;
mod event;
mod executor;
mod init;
mod live_view;
mod orchestrator;
mod policy;
mod report;
mod result;
mod run;
mod session_runner;
mod shutdown;
mod status_board;
mod task;
mod types;
mod workload;

pub mod prelude {
    pub use crate::cli::{SessionCount, StressCli};
    pub use crate::definition::{RunDefinition, RunDefinitionBuilder};
    pub use crate::error::{DestroyError, SessionFailure, UserLookupError};
    pub use crate::event::{status_channel, StatusEvent, StatusSender, UserStatusSender};
    pub use crate::executor::Executor;
    pub use crate::init::{default_log_file, init, init_logging};
    pub use crate::live_view::{
        run_live_view, LogOutput, StatusOutput, TerminalOutput, DEFAULT_TICK,
    };
    pub use crate::orchestrator::{Orchestrator, TeardownReport};
    pub use crate::policy::ReadyPolicy;
    pub use crate::report::{render_results, render_teardown};
    pub use crate::result::UserRunResult;
    pub use crate::run::{run, RunOutcome};
    pub use crate::session_runner::{DestroyRoster, SessionRunner, User};
    pub use crate::status_board::{format_duration, StatusBoard};
    pub use crate::task::{SessionTask, TaskState};
    pub use crate::types::StressResult;
    pub use crate::workload::{WorkloadCommand, WorkloadKind};
}
