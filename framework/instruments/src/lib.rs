mod report;

use std::time::{Duration, Instant};

pub use report::{InMemoryReporter, OperationRow, ReportCollector, Reporter};

/// Timing for a single call to the session service.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub operation_id: String,
    started: Instant,
    pub elapsed: Option<Duration>,
    pub is_error: bool,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
        }
    }

    /// How long the operation took, once it has been reported.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }

    fn finish(&mut self, is_error: bool) {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = is_error;
    }
}

/// Record the outcome of an operation started with [OperationRecord::new].
pub fn report_operation<T, E>(
    reporter: &Reporter,
    mut operation_record: OperationRecord,
    response: &Result<T, E>,
) {
    operation_record.finish(response.is_err());
    log::trace!(
        "Operation {} took {:?}, failed: {}",
        operation_record.operation_id,
        operation_record.elapsed,
        operation_record.is_error
    );
    reporter.add_operation(&operation_record);
}
