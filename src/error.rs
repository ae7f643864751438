//! Recoverable error taxonomy for filtering, metrics and charts.
//!
//! None of these abort a render pass: the component that detects one turns it
//! into a notice (status line, sidebar note or inline chart message).

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    /// An expected column is missing from a table.
    #[error("column `{column}` is missing from the {table} table")]
    DataShape { table: String, column: String },

    /// A range column has no data or no variation to filter on.
    #[error("not enough data/variation to filter `{column}`")]
    DegenerateRange { column: String },

    /// The active filters eliminated every row.
    #[error("no records match the current filters")]
    EmptyResult,

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

impl DashboardError {
    pub fn data_shape(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::DataShape {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn degenerate(column: impl Into<String>) -> Self {
        Self::DegenerateRange {
            column: column.into(),
        }
    }
}

/// Invalid input handed to a chart builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartError {
    #[error("no features provided for {0}")]
    NoFeatures(&'static str),

    #[error("missing column: expected `{0}` in the table")]
    MissingColumn(String),

    #[error("no data available for {0}")]
    NoData(String),
}

/// Format an error for the status line.
pub fn user_message(err: &DashboardError) -> String {
    match err {
        DashboardError::Polars(e) => user_message_from_polars(e),
        DashboardError::Chart(e) => format!("Chart unavailable: {e}"),
        other => other.to_string(),
    }
}

/// Format a PolarsError by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!("Column not found: {msg}"),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {msg}"),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {msg}"),
        PE::NoData(msg) => format!("No data: {msg}"),
        PE::ComputeError(msg) => msg.to_string(),
        PE::IO { error, .. } => format!("I/O error: {error}"),
        PE::Context { error, msg } => format!("{msg}: {}", user_message_from_polars(error)),
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_degenerate_message_names_column() {
        let err = DashboardError::degenerate("Income");
        assert_eq!(err.to_string(), "not enough data/variation to filter `Income`");
    }

    #[test]
    fn test_user_message_for_missing_column() {
        let err = DashboardError::from(PolarsError::ColumnNotFound("City".into()));
        assert!(user_message(&err).starts_with("Column not found"));
    }

    #[test]
    fn test_chart_error_converts() {
        let err: DashboardError = ChartError::MissingColumn("Latitude".to_string()).into();
        assert!(user_message(&err).contains("Latitude"));
    }
}
