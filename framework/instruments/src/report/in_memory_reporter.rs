pub(crate) mod operations_table;

use std::time::Duration;

use itertools::Itertools;
use tabled::settings::Style;
use tabled::Table;

use crate::report::in_memory_reporter::operations_table::OperationRow;
use crate::report::ReportCollector;
use crate::OperationRecord;

/// Keeps every operation in memory and prints a summary of them at the end of the run.
#[derive(Default)]
pub struct InMemoryReporter {
    operation_records: Vec<OperationRecord>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn print_summary_of_operations(&self) {
        let rows = self.summary();
        if rows.is_empty() {
            return;
        }

        println!("\nSummary of operations");
        let mut table = Table::new(rows);
        table.with(Style::modern());

        println!("{table}");
    }
}

impl ReportCollector for InMemoryReporter {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.operation_records.push(operation_record.clone());
    }

    fn summary(&self) -> Vec<OperationRow> {
        self.operation_records
            .iter()
            .into_group_map_by(|record| record.operation_id.as_str())
            .into_iter()
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(operation_id, operations)| {
                let total_operations = operations.len();
                let total_duration_micro = operations
                    .iter()
                    .map(|record| record.duration().unwrap_or_default().as_micros())
                    .sum::<u128>();

                let successful = operations
                    .iter()
                    .filter(|op| !op.is_error)
                    .filter_map(|op| op.duration())
                    .collect::<Vec<Duration>>();

                OperationRow {
                    operation_id: operation_id.to_string(),
                    total_operations,
                    failed_operations: total_operations - successful.len(),
                    total_duration_ms: total_duration_micro as f64 / 1000.0,
                    avg_time_ms: (total_duration_micro as f64 / total_operations as f64) / 1000.0,
                    min_time_ms: successful.iter().min().map(as_millis_f64),
                    max_time_ms: successful.iter().max().map(as_millis_f64),
                }
            })
            .collect()
    }

    fn finalize(&self) {
        self.print_summary_of_operations();
    }
}

fn as_millis_f64(d: &Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}
