use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use env_logger::{Target, WriteStyle};
use log::{LevelFilter, Log, Metadata, Record};

use crate::cli::StressCli;
use crate::live_view::with_view_suspended;

const DEFAULT_LOG_FILE_NAME: &str = "stress-test.log";

/// Parse the command line for the stress runner.
pub fn init() -> StressCli {
    StressCli::parse()
}

/// `stress-test.log` in the same directory as the running executable, falling back to the
/// working directory if the executable path is not available.
pub fn default_log_file() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_LOG_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE_NAME))
}

/// Install the logger for the stress runner.
///
/// Everything at `level` and above is appended to `log_file`. Errors are also written to stderr,
/// with a pointer to the log file for details.
pub fn init_logging(log_file: &Path, level: &str) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    let file_logger = env_logger::Builder::new()
        .parse_filters(level)
        .target(Target::Pipe(Box::new(file)))
        .write_style(WriteStyle::Never)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {}: {}",
                chrono::Local::now().format("%Y/%m/%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .build();

    let log_path = log_file.display().to_string();
    let console_logger = env_logger::Builder::new()
        .filter_level(LevelFilter::Error)
        .target(Target::Stderr)
        .format(move |buf, record| {
            writeln!(buf, "{}: {}", record.level(), record.args())?;
            writeln!(buf, "See {log_path} for more info")
        })
        .build();

    let max_level = file_logger.filter().max(console_logger.filter());
    log::set_boxed_logger(Box::new(DualLogger {
        file: file_logger,
        console: console_logger,
    }))
    .context("Logger already initialised")?;
    log::set_max_level(max_level);

    Ok(())
}

struct DualLogger {
    file: env_logger::Logger,
    console: env_logger::Logger,
}

impl Log for DualLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.file.enabled(metadata) || self.console.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        // Each logger applies its own filter.
        self.file.log(record);
        if self.console.enabled(record.metadata()) {
            with_view_suspended(|| self.console.log(record));
        }
    }

    fn flush(&self) {
        self.file.flush();
        self.console.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_file_name() {
        assert!(default_log_file().ends_with(DEFAULT_LOG_FILE_NAME));
    }

    #[test]
    fn writes_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stress.log");

        init_logging(&path, "info").unwrap();
        log::info!("Session 1 for user alice is running");
        log::debug!("Not written at info level");
        log::logger().flush();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("INFO: Session 1 for user alice is running"));
        assert!(!content.contains("Not written"));
    }
}
