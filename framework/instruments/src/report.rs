mod in_memory_reporter;

use parking_lot::Mutex;

use crate::OperationRecord;

pub use in_memory_reporter::operations_table::OperationRow;
pub use in_memory_reporter::InMemoryReporter;

pub trait ReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord);

    /// Summarise the operations collected so far, one row per operation id.
    fn summary(&self) -> Vec<OperationRow>;

    fn finalize(&self);
}

/// Shared entry point for recording operations from many concurrent tasks.
pub struct Reporter {
    collector: Mutex<Option<Box<dyn ReportCollector + Send>>>,
}

impl Reporter {
    pub fn in_memory() -> Self {
        Self {
            collector: Mutex::new(Some(Box::new(InMemoryReporter::new()))),
        }
    }

    /// A reporter that drops everything it is given.
    pub fn disabled() -> Self {
        Self {
            collector: Mutex::new(None),
        }
    }

    pub fn add_operation(&self, operation_record: &OperationRecord) {
        if let Some(collector) = self.collector.lock().as_mut() {
            collector.add_operation(operation_record);
        }
    }

    pub fn summary(&self) -> Vec<OperationRow> {
        self.collector
            .lock()
            .as_ref()
            .map(|c| c.summary())
            .unwrap_or_default()
    }

    pub fn finalize(&self) {
        if let Some(collector) = self.collector.lock().as_ref() {
            collector.finalize();
        }
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter").finish()
    }
}
