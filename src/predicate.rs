//! Per-column filter conditions and the rules that turn raw widget input
//! into them.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{self, date_to_days, ColumnRole, Table};
use crate::error::DashboardError;

/// A single-column condition, combined with others by logical AND.
/// Bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    CategoricalSet {
        column: String,
        allowed: Vec<String>,
    },
    NumericRange {
        column: String,
        low: f64,
        high: f64,
    },
    DateRange {
        column: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl Predicate {
    pub fn column(&self) -> &str {
        match self {
            Self::CategoricalSet { column, .. }
            | Self::NumericRange { column, .. }
            | Self::DateRange { column, .. } => column,
        }
    }

    /// Polars expression selecting matching rows. Null compares to null and is dropped by `filter`.
    pub fn to_expr(&self) -> Expr {
        match self {
            Self::CategoricalSet { column, allowed } => allowed
                .iter()
                .map(|v| {
                    col(column.as_str())
                        .cast(DataType::String)
                        .eq(lit(v.as_str()))
                })
                .reduce(|acc, e| acc.or(e))
                .unwrap_or_else(|| lit(true)),
            Self::NumericRange { column, low, high } => {
                let value = col(column.as_str()).cast(DataType::Float64);
                value.clone().gt_eq(lit(*low)).and(value.lt_eq(lit(*high)))
            }
            Self::DateRange { column, start, end } => {
                let days = col(column.as_str()).cast(DataType::Int32);
                days.clone()
                    .gt_eq(lit(date_to_days(*start)))
                    .and(days.lt_eq(lit(date_to_days(*end))))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::CategoricalSet { column, allowed } => {
                format!("{column} in [{}]", allowed.join(", "))
            }
            Self::NumericRange { column, low, high } => format!("{column} {low}..{high}"),
            Self::DateRange { column, start, end } => format!("{column} {start}..{end}"),
        }
    }
}

/// The kind of control a column gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidgetKind {
    MultiSelect,
    NumberRange,
    DateRange,
}

impl WidgetKind {
    pub fn for_role(role: ColumnRole) -> Option<Self> {
        match role {
            ColumnRole::Categorical => Some(Self::MultiSelect),
            ColumnRole::NumericContinuous | ColumnRole::NumericDiscrete => Some(Self::NumberRange),
            ColumnRole::Date => Some(Self::DateRange),
            ColumnRole::Identifier | ColumnRole::Unclassified => None,
        }
    }
}

/// Raw state of a filter control as the user left it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WidgetValue {
    Selection(Vec<String>),
    NumberRange(Option<f64>, Option<f64>),
    DateRange(Option<NaiveDate>, Option<NaiveDate>),
}

const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

impl WidgetValue {
    /// Parse text typed into a control.
    ///
    /// Ranges are `low..high`; a bare value means `value..value`. Selections are
    /// comma separated. Malformed input never fails: unreadable bounds are left
    /// undefined and the range falls back to the observed one.
    pub fn parse(kind: WidgetKind, text: &str) -> Self {
        match kind {
            WidgetKind::MultiSelect => {
                let mut values: Vec<String> = Vec::new();
                for v in text.split(',').map(str::trim).filter(|v| !v.is_empty()) {
                    if !values.iter().any(|seen| seen == v) {
                        values.push(v.to_string());
                    }
                }
                Self::Selection(values)
            }
            WidgetKind::NumberRange => {
                let (low, high) = split_range(text);
                let number = |s: &str| s.parse::<f64>().ok().filter(|v| v.is_finite());
                Self::NumberRange(low.and_then(number), high.and_then(number))
            }
            WidgetKind::DateRange => {
                let (low, high) = split_range(text);
                let date = |s: &str| NaiveDate::parse_from_str(s, DATE_INPUT_FORMAT).ok();
                Self::DateRange(low.and_then(date), high.and_then(date))
            }
        }
    }

    pub fn kind(&self) -> WidgetKind {
        match self {
            Self::Selection(_) => WidgetKind::MultiSelect,
            Self::NumberRange(..) => WidgetKind::NumberRange,
            Self::DateRange(..) => WidgetKind::DateRange,
        }
    }

    /// Text form accepted back by [`WidgetValue::parse`].
    pub fn to_input_text(&self) -> String {
        fn bound<T: ToString>(v: &Option<T>) -> String {
            v.as_ref().map(ToString::to_string).unwrap_or_default()
        }
        match self {
            Self::Selection(values) => values.join(", "),
            Self::NumberRange(low, high) => format!("{}..{}", bound(low), bound(high)),
            Self::DateRange(start, end) => format!(
                "{}..{}",
                start.map(|d| d.format(DATE_INPUT_FORMAT).to_string()).unwrap_or_default(),
                end.map(|d| d.format(DATE_INPUT_FORMAT).to_string()).unwrap_or_default()
            ),
        }
    }
}

fn split_range(text: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(s: &str) -> Option<&str> {
        Some(s.trim()).filter(|s| !s.is_empty())
    }
    match text.split_once("..") {
        Some((low, high)) => (non_empty(low), non_empty(high)),
        None => {
            let single = non_empty(text);
            (single, single)
        }
    }
}

/// Values a column actually holds in its base table.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDomain {
    Categories(Vec<String>),
    Numeric { min: f64, max: f64 },
    Dates { min: NaiveDate, max: NaiveDate },
    /// All null, no variation, or fewer than two categories.
    Degenerate,
    /// Identifier or unclassified columns never get a filter.
    Unfilterable,
}

impl ColumnDomain {
    pub fn observe(table: &Table, column: &str, role: ColumnRole) -> Result<Self, DashboardError> {
        let series = table
            .frame()
            .column(column)
            .map_err(|_| DashboardError::data_shape(table.kind().label(), column))?
            .as_materialized_series();

        let domain = match role {
            ColumnRole::Identifier | ColumnRole::Unclassified => Self::Unfilterable,
            ColumnRole::Categorical => {
                let values = catalog::distinct_text(series)?;
                if values.len() < 2 {
                    Self::Degenerate
                } else {
                    Self::Categories(values)
                }
            }
            ColumnRole::NumericContinuous | ColumnRole::NumericDiscrete => {
                let bounds = catalog::float_values(series)?
                    .into_iter()
                    .flatten()
                    .filter(|v| v.is_finite())
                    .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                        None => Some((v, v)),
                        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                    });
                match bounds {
                    Some((min, max)) if min < max => Self::Numeric { min, max },
                    _ => Self::Degenerate,
                }
            }
            ColumnRole::Date => {
                let dates = catalog::date_values(series)?;
                let min = dates.iter().flatten().min().copied();
                let max = dates.iter().flatten().max().copied();
                match (min, max) {
                    (Some(min), Some(max)) if min < max => Self::Dates { min, max },
                    _ => Self::Degenerate,
                }
            }
        };
        Ok(domain)
    }

    /// The "no constraint" value of the control, if the column gets one.
    pub fn default_value(&self) -> Option<WidgetValue> {
        match self {
            Self::Categories(_) => Some(WidgetValue::Selection(Vec::new())),
            Self::Numeric { min, max } => Some(WidgetValue::NumberRange(Some(*min), Some(*max))),
            Self::Dates { min, max } => Some(WidgetValue::DateRange(Some(*min), Some(*max))),
            Self::Degenerate | Self::Unfilterable => None,
        }
    }
}

/// Outcome of turning a widget value into a filter.
#[derive(Debug)]
pub enum BuiltPredicate {
    Apply(Predicate),
    /// No constraint on this column, with the notice to show if there is one.
    Skip(Option<DashboardError>),
}

impl BuiltPredicate {
    pub fn predicate(&self) -> Option<&Predicate> {
        match self {
            Self::Apply(p) => Some(p),
            Self::Skip(_) => None,
        }
    }
}

/// Build the filter for one column from its raw control value.
pub fn build_predicate(
    column: &str,
    role: ColumnRole,
    raw: Option<&WidgetValue>,
    table: &Table,
) -> BuiltPredicate {
    match ColumnDomain::observe(table, column, role) {
        Ok(domain) => predicate_for(column, role, &domain, raw),
        Err(e) => BuiltPredicate::Skip(Some(e)),
    }
}

/// Same as [`build_predicate`] with an already observed domain.
pub fn predicate_for(
    column: &str,
    role: ColumnRole,
    domain: &ColumnDomain,
    raw: Option<&WidgetValue>,
) -> BuiltPredicate {
    let built = match (domain, raw) {
        (ColumnDomain::Unfilterable, _) => BuiltPredicate::Skip(None),
        (ColumnDomain::Degenerate, _) if role.is_range() => {
            BuiltPredicate::Skip(Some(DashboardError::degenerate(column)))
        }
        (ColumnDomain::Degenerate, _) => BuiltPredicate::Skip(None),
        (ColumnDomain::Categories(_), Some(WidgetValue::Selection(selected)))
            if !selected.is_empty() =>
        {
            BuiltPredicate::Apply(Predicate::CategoricalSet {
                column: column.to_string(),
                allowed: selected.clone(),
            })
        }
        (&ColumnDomain::Numeric { min, max }, Some(&WidgetValue::NumberRange(low, high))) => {
            match well_formed(low, high, |v| v.is_finite()) {
                // Disjoint from the data: keep the typed bounds so nothing matches.
                Some((low, high)) if low > max || high < min => {
                    BuiltPredicate::Apply(Predicate::NumericRange {
                        column: column.to_string(),
                        low,
                        high,
                    })
                }
                Some((low, high)) => {
                    let (low, high) = (low.clamp(min, max), high.clamp(min, max));
                    if low <= min && high >= max {
                        BuiltPredicate::Skip(None)
                    } else {
                        BuiltPredicate::Apply(Predicate::NumericRange {
                            column: column.to_string(),
                            low,
                            high,
                        })
                    }
                }
                None => BuiltPredicate::Skip(None),
            }
        }
        (&ColumnDomain::Dates { min, max }, Some(&WidgetValue::DateRange(start, end))) => {
            match well_formed(start, end, |_| true) {
                Some((start, end)) if start > max || end < min => {
                    BuiltPredicate::Apply(Predicate::DateRange {
                        column: column.to_string(),
                        start,
                        end,
                    })
                }
                Some((start, end)) => {
                    let (start, end) = (start.clamp(min, max), end.clamp(min, max));
                    if start <= min && end >= max {
                        BuiltPredicate::Skip(None)
                    } else {
                        BuiltPredicate::Apply(Predicate::DateRange {
                            column: column.to_string(),
                            start,
                            end,
                        })
                    }
                }
                None => BuiltPredicate::Skip(None),
            }
        }
        // Empty selection, missing value or a value of the wrong kind: full range.
        _ => BuiltPredicate::Skip(None),
    };
    debug!(column, ?built, "built predicate");
    built
}

/// Both bounds present, valid and ordered; otherwise the input is treated as malformed.
fn well_formed<T: PartialOrd + Copy>(
    low: Option<T>,
    high: Option<T>,
    valid: impl Fn(T) -> bool,
) -> Option<(T, T)> {
    match (low, high) {
        (Some(low), Some(high)) if valid(low) && valid(high) && low <= high => Some((low, high)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableKind;

    fn table() -> Table {
        let enrolled = Series::new(
            "EnrollmentDateOpening".into(),
            vec![Some(17_000i32), Some(17_500), None],
        )
        .cast(&DataType::Date)
        .unwrap();
        let cancelled = Series::new("CancelledDate".into(), vec![None::<i32>, None, None])
            .cast(&DataType::Date)
            .unwrap();
        let mut df = df!(
            "Loyalty#" => &[1i64, 2, 3],
            "City" => &["Toronto", "Ottawa", "Toronto"],
            "Country" => &["Canada", "Canada", "Canada"],
            "Income" => &[10000.0, 50000.0, 90000.0],
            "Salary" => &[7.0, 7.0, 7.0],
        )
        .unwrap();
        df.with_column(enrolled).unwrap();
        df.with_column(cancelled).unwrap();
        Table::new(TableKind::Customers, df, "Loyalty#", &["Income".to_string()])
    }

    fn build(column: &str, raw: Option<&WidgetValue>) -> BuiltPredicate {
        let table = table();
        let role = table.role(column).unwrap_or(ColumnRole::Unclassified);
        build_predicate(column, role, raw, &table)
    }

    #[test]
    fn test_range_is_clamped_to_observed() {
        let raw = WidgetValue::NumberRange(Some(20000.0), Some(1e9));
        match build("Income", Some(&raw)) {
            BuiltPredicate::Apply(Predicate::NumericRange { low, high, .. }) => {
                assert_eq!(low, 20000.0);
                assert_eq!(high, 90000.0);
            }
            other => panic!("expected range, got {other:?}"),
        }
    }

    #[test]
    fn test_range_outside_observed_keeps_typed_bounds() {
        let raw = WidgetValue::NumberRange(Some(200000.0), Some(300000.0));
        match build("Income", Some(&raw)) {
            BuiltPredicate::Apply(Predicate::NumericRange { low, high, .. }) => {
                assert_eq!(low, 200000.0);
                assert_eq!(high, 300000.0);
            }
            other => panic!("expected range, got {other:?}"),
        }

        let start = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2030, 12, 31).unwrap();
        let raw = WidgetValue::DateRange(Some(start), Some(end));
        assert!(matches!(
            build("EnrollmentDateOpening", Some(&raw)),
            BuiltPredicate::Apply(Predicate::DateRange { start: s, end: e, .. }) if s == start && e == end
        ));
    }

    #[test]
    fn test_malformed_range_falls_back_to_full_range() {
        for raw in [
            WidgetValue::NumberRange(Some(90000.0), Some(10.0)),
            WidgetValue::NumberRange(None, Some(50000.0)),
            WidgetValue::NumberRange(Some(f64::NAN), Some(50000.0)),
            WidgetValue::parse(WidgetKind::NumberRange, "abc..def"),
        ] {
            assert!(matches!(build("Income", Some(&raw)), BuiltPredicate::Skip(None)));
        }
    }

    #[test]
    fn test_constant_numeric_column_is_degenerate() {
        let raw = WidgetValue::NumberRange(Some(0.0), Some(10.0));
        match build("Salary", Some(&raw)) {
            BuiltPredicate::Skip(Some(err)) => {
                assert_eq!(err.to_string(), "not enough data/variation to filter `Salary`")
            }
            other => panic!("expected degenerate notice, got {other:?}"),
        }
    }

    #[test]
    fn test_all_null_dates_skip() {
        let raw = WidgetValue::parse(WidgetKind::DateRange, "2020-01-01..2021-01-01");
        assert!(matches!(
            build("CancelledDate", Some(&raw)),
            BuiltPredicate::Skip(Some(DashboardError::DegenerateRange { .. }))
        ));
    }

    #[test]
    fn test_single_category_column_skips() {
        let raw = WidgetValue::Selection(vec!["Canada".to_string()]);
        assert!(matches!(build("Country", Some(&raw)), BuiltPredicate::Skip(None)));
    }

    #[test]
    fn test_empty_selection_is_no_constraint() {
        let raw = WidgetValue::Selection(Vec::new());
        assert!(matches!(build("City", Some(&raw)), BuiltPredicate::Skip(None)));
    }

    #[test]
    fn test_absent_column_reports_data_shape() {
        let raw = WidgetValue::Selection(vec!["x".to_string()]);
        assert!(matches!(
            build("Gender", Some(&raw)),
            BuiltPredicate::Skip(Some(DashboardError::DataShape { .. }))
        ));
    }

    #[test]
    fn test_identifier_is_unfilterable() {
        let table = table();
        let domain = ColumnDomain::observe(&table, "Loyalty#", ColumnRole::Identifier).unwrap();
        assert_eq!(domain, ColumnDomain::Unfilterable);
        assert_eq!(domain.default_value(), None);
    }

    #[test]
    fn test_date_range_partial_input_falls_back() {
        let raw = WidgetValue::parse(WidgetKind::DateRange, "2016-08-01..");
        assert!(matches!(
            build("EnrollmentDateOpening", Some(&raw)),
            BuiltPredicate::Skip(None)
        ));
    }

    #[test]
    fn test_date_predicate_excludes_null_rows() {
        let table = table();
        let start = catalog::days_to_date(17_000).unwrap();
        let predicate = Predicate::DateRange {
            column: "EnrollmentDateOpening".to_string(),
            start,
            end: start,
        };
        let out = table
            .frame()
            .clone()
            .lazy()
            .filter(predicate.to_expr())
            .collect()
            .unwrap();
        assert_eq!(out.height(), 1);
    }

    #[test]
    fn test_parse_widget_text() {
        assert_eq!(
            WidgetValue::parse(WidgetKind::MultiSelect, " Toronto, Ottawa,,Toronto "),
            WidgetValue::Selection(vec!["Toronto".to_string(), "Ottawa".to_string()])
        );
        assert_eq!(
            WidgetValue::parse(WidgetKind::NumberRange, "2021"),
            WidgetValue::NumberRange(Some(2021.0), Some(2021.0))
        );
        let value = WidgetValue::parse(WidgetKind::DateRange, "2020-01-31..2020-02-29");
        assert_eq!(
            WidgetValue::parse(WidgetKind::DateRange, &value.to_input_text()),
            value
        );
    }
}
