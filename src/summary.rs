//! Metrics and chart inputs derived from a filtered view. Stateless.

use polars::prelude::*;
use std::collections::HashMap;
use std::fmt;

use crate::catalog;
use crate::engine::FilteredView;
use crate::error::DashboardError;

/// A reduction shown in a page's metrics bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricSpec {
    RowCount,
    Sum(String),
    Mode(String),
    Mean(String),
}

impl MetricSpec {
    pub fn label(&self) -> String {
        match self {
            Self::RowCount => "Records".to_string(),
            Self::Sum(column) => format!("Total {column}"),
            Self::Mode(column) => format!("Top {column}"),
            Self::Mean(column) => format!("Avg {column}"),
        }
    }

    fn column(&self) -> Option<&str> {
        match self {
            Self::RowCount => None,
            Self::Sum(c) | Self::Mode(c) | Self::Mean(c) => Some(c),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Count(usize),
    Number(f64),
    Text(String),
    /// The column held no non-null value.
    Unavailable,
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{}", group_thousands(&n.to_string())),
            Self::Number(v) => write!(f, "{}", format_number(*v)),
            Self::Text(s) => write!(f, "{s}"),
            Self::Unavailable => write!(f, "-"),
        }
    }
}

/// Two decimals with thousands separators, dropping `.00`.
pub fn format_number(v: f64) -> String {
    let text = format!("{:.2}", v.abs());
    let (int_part, frac) = text.split_once('.').unwrap_or((&text, "00"));
    let sign = if v < 0.0 && text != "0.00" { "-" } else { "" };
    let grouped = group_thousands(int_part);
    if frac == "00" {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub label: String,
    pub value: MetricValue,
}

#[derive(Debug, Default)]
pub struct Metrics {
    pub values: Vec<Metric>,
    /// Metrics omitted because their column is missing.
    pub notices: Vec<DashboardError>,
}

impl Metrics {
    pub fn get(&self, label: &str) -> Option<&MetricValue> {
        self.values.iter().find(|m| m.label == label).map(|m| &m.value)
    }
}

/// Compute `specs` over a non-empty view. An empty view is `EmptyResult`.
pub fn summarize(view: &FilteredView, specs: &[MetricSpec]) -> Result<Metrics, DashboardError> {
    let frame = view.require_rows()?;
    let mut metrics = Metrics::default();

    for spec in specs {
        let series = match spec.column() {
            None => None,
            Some(column) => match frame.column(column) {
                Ok(c) => Some(c.as_materialized_series()),
                Err(_) => {
                    metrics
                        .notices
                        .push(DashboardError::data_shape(view.table.label(), column));
                    continue;
                }
            },
        };

        let value = match (spec, series) {
            (MetricSpec::RowCount, _) => MetricValue::Count(frame.height()),
            (MetricSpec::Sum(_), Some(s)) => {
                let values: Vec<f64> = catalog::float_values(s)?.into_iter().flatten().collect();
                if values.is_empty() {
                    MetricValue::Unavailable
                } else {
                    MetricValue::Number(values.iter().sum())
                }
            }
            (MetricSpec::Mean(_), Some(s)) => {
                let values: Vec<f64> = catalog::float_values(s)?.into_iter().flatten().collect();
                if values.is_empty() {
                    MetricValue::Unavailable
                } else {
                    MetricValue::Number(values.iter().sum::<f64>() / values.len() as f64)
                }
            }
            (MetricSpec::Mode(_), Some(s)) => match mode(&catalog::text_values(s)?) {
                Some(top) => MetricValue::Text(top),
                None => MetricValue::Unavailable,
            },
            (_, None) => MetricValue::Unavailable,
        };
        metrics.values.push(Metric {
            label: spec.label(),
            value,
        });
    }

    Ok(metrics)
}

/// Most frequent non-null value. Ties go to the value seen first in row order.
pub fn mode(values: &[Option<String>]) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (row, value) in values.iter().enumerate() {
        if let Some(v) = value {
            counts.entry(v.as_str()).or_insert((0, row)).0 += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(value, _)| value.to_string())
}

/// Non-null finite values of a numeric column.
pub fn feature_values(frame: &DataFrame, column: &str) -> PolarsResult<Vec<f64>> {
    let series = frame.column(column)?.as_materialized_series();
    Ok(catalog::float_values(series)?
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect())
}

/// Columns the user chose to chart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartSelection {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

/// Column vectors handed to chart builders, nulls dropped per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartInput {
    pub numeric: Vec<(String, Vec<f64>)>,
    pub categorical: Vec<(String, Vec<String>)>,
    /// Selected columns absent from the view.
    pub missing: Vec<String>,
}

impl ChartInput {
    pub fn from_frame(frame: &DataFrame, selection: &ChartSelection) -> PolarsResult<Self> {
        let mut input = Self::default();
        for column in &selection.numeric {
            if frame.column(column).is_err() {
                input.missing.push(column.clone());
                continue;
            }
            input
                .numeric
                .push((column.clone(), feature_values(frame, column)?));
        }
        for column in &selection.categorical {
            let Ok(c) = frame.column(column) else {
                input.missing.push(column.clone());
                continue;
            };
            let values = catalog::text_values(c.as_materialized_series())?
                .into_iter()
                .flatten()
                .collect();
            input.categorical.push((column.clone(), values));
        }
        Ok(input)
    }

    pub fn values(&self, column: &str) -> Option<&[f64]> {
        self.numeric
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, values)| values.as_slice())
    }
}

/// Project the selected columns of a non-empty view for charting.
pub fn prepare_chart_inputs(
    view: &FilteredView,
    selection: &ChartSelection,
) -> Result<ChartInput, DashboardError> {
    let frame = view.require_rows()?;
    Ok(ChartInput::from_frame(frame, selection)?)
}
