use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, Encoder,
    HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};

lazy_static! {
    pub static ref DATABASE_OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "database_operation_duration_seconds",
        "Database operation duration in seconds",
        &["operation", "table", "status"]
    ).unwrap();

    pub static ref OPERATION_COUNTER: IntCounterVec = register_int_counter_vec!(
        "operations_total",
        "Total number of operations",
        &["operation", "status"]
    ).unwrap();

    pub static ref ROWS_TRANSFERRED: IntCounterVec = register_int_counter_vec!(
        "rows_transferred_total",
        "Source rows by what happened to them",
        &["table", "outcome"]
    ).unwrap();

    pub static ref ACTIVE_CONNECTIONS: IntGaugeVec = register_int_gauge_vec!(
        "active_connections",
        "Number of active database connections",
        &["database"]
    ).unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Written,
    Skipped,
    Empty,
    Failed,
}

impl RowOutcome {
    fn label(&self) -> &'static str {
        match self {
            RowOutcome::Written => "written",
            RowOutcome::Skipped => "skipped",
            RowOutcome::Empty => "empty",
            RowOutcome::Failed => "failed",
        }
    }
}

pub fn record_operation(operation: &str, table: &str, success: bool, duration: f64) {
    let status = if success { "success" } else { "failure" };
    DATABASE_OPERATION_DURATION
        .with_label_values(&[operation, table, status])
        .observe(duration);
    OPERATION_COUNTER
        .with_label_values(&[operation, status])
        .inc();
}

pub fn record_row(table: &str, outcome: RowOutcome) {
    ROWS_TRANSFERRED
        .with_label_values(&[table, outcome.label()])
        .inc();
}

/// Prometheus text exposition of every registered metric.
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
