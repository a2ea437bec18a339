use tabled::Tabled;

#[derive(Tabled, Debug, Clone, PartialEq)]
pub struct OperationRow {
    pub operation_id: String,
    #[tabled(display = "float2")]
    pub avg_time_ms: f64,
    #[tabled(display = "opt_float2")]
    pub min_time_ms: Option<f64>,
    #[tabled(display = "opt_float2")]
    pub max_time_ms: Option<f64>,
    pub total_operations: usize,
    pub failed_operations: usize,
    #[tabled(display = "float2")]
    pub total_duration_ms: f64,
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}

fn opt_float2(n: &Option<f64>) -> String {
    n.map(|n| float2(&n)).unwrap_or_else(|| "-".to_string())
}
