//! Recomputes a page's filtered view from its base table and the current
//! filter state.

use polars::prelude::*;
use std::collections::HashSet;
use tracing::debug;

use crate::catalog::{self, ColumnRole, Table, TableKind};
use crate::error::DashboardError;
use crate::predicate::{predicate_for, BuiltPredicate, ColumnDomain, Predicate, WidgetKind, WidgetValue};
use crate::state::{FilterStateStore, Page};
use crate::summary::MetricSpec;

/// Which table a page filters, its filter columns in application order, and its metrics.
#[derive(Debug, Clone)]
pub struct PageLayout {
    pub page: Page,
    pub table: TableKind,
    pub filters: Vec<String>,
    pub metrics: Vec<MetricSpec>,
}

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl PageLayout {
    pub fn for_page(page: Page) -> Self {
        match page {
            Page::CustomerExplorer => Self {
                page,
                table: TableKind::Customers,
                filters: names(&[
                    "EnrollmentDateOpening",
                    "Province or State",
                    "City",
                    "Gender",
                    "Education",
                    "Marital Status",
                    "LoyaltyStatus",
                    "EnrollmentType",
                    "Income",
                    "Customer Lifetime Value",
                ]),
                metrics: vec![
                    MetricSpec::RowCount,
                    MetricSpec::Sum("Customer Lifetime Value".to_string()),
                    MetricSpec::Mean("Income".to_string()),
                    MetricSpec::Mode("LoyaltyStatus".to_string()),
                    MetricSpec::Mode("Province or State".to_string()),
                ],
            },
            Page::FlightsExplorer => Self {
                page,
                table: TableKind::Flights,
                filters: names(&[
                    "YearMonthDate",
                    "Year",
                    "NumFlights",
                    "NumFlightsWithCompanions",
                    "DistanceKM",
                    "PointsAccumulated",
                    "PointsRedeemed",
                ]),
                metrics: vec![
                    MetricSpec::RowCount,
                    MetricSpec::Sum("NumFlights".to_string()),
                    MetricSpec::Sum("DistanceKM".to_string()),
                    MetricSpec::Sum("PointsAccumulated".to_string()),
                    MetricSpec::Sum("PointsRedeemed".to_string()),
                ],
            },
            Page::Insights => Self {
                page,
                table: TableKind::Customers,
                filters: names(&[
                    "Province or State",
                    "LoyaltyStatus",
                    "Gender",
                    "Education",
                    "Income",
                ]),
                metrics: vec![
                    MetricSpec::RowCount,
                    MetricSpec::Mode("Education".to_string()),
                ],
            },
        }
    }
}

/// Rows of a base table that satisfy every active filter of a page.
#[derive(Debug)]
pub struct FilteredView {
    pub page: Page,
    pub table: TableKind,
    pub frame: DataFrame,
    pub base_rows: usize,
    pub applied: Vec<Predicate>,
    /// Column whose filter emptied the view, when filtering stopped early.
    pub eliminated_by: Option<String>,
    /// Recovered problems (degenerate ranges, missing columns) to show the user.
    pub notices: Vec<DashboardError>,
}

impl FilteredView {
    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// The rows, or `EmptyResult` when nothing matched.
    pub fn require_rows(&self) -> Result<&DataFrame, DashboardError> {
        if self.is_empty() {
            Err(DashboardError::EmptyResult)
        } else {
            Ok(&self.frame)
        }
    }
}

/// AND every predicate into `frame`, in order.
pub fn apply_predicates(frame: &DataFrame, predicates: &[Predicate]) -> PolarsResult<DataFrame> {
    let mut lf = frame.clone().lazy();
    for predicate in predicates {
        lf = lf.filter(predicate.to_expr());
    }
    lf.collect()
}

/// Keep rows of `frame` whose `identifier` value appears in `keys`.
/// Identifiers are compared as text so integer and string keys line up.
pub fn restrict_to_ids(frame: &DataFrame, keys: &DataFrame, identifier: &str) -> PolarsResult<DataFrame> {
    let wanted: HashSet<String> = catalog::text_values(keys.column(identifier)?.as_materialized_series())?
        .into_iter()
        .flatten()
        .collect();
    let values = catalog::text_values(frame.column(identifier)?.as_materialized_series())?;
    let mask: BooleanChunked = values
        .iter()
        .map(|v| Some(v.as_ref().is_some_and(|v| wanted.contains(v))))
        .collect();
    frame.filter(&mask)
}

/// Build the page's filtered view from the current store values.
///
/// Columns are visited in layout order. Columns missing from the table are
/// ignored, degenerate ranges add a notice, and filtering stops once no row
/// is left.
pub fn apply_filters(
    base: &Table,
    layout: &PageLayout,
    store: &FilterStateStore,
) -> Result<FilteredView, DashboardError> {
    let mut frame = base.frame().clone();
    let mut applied = Vec::new();
    let mut notices = Vec::new();
    let mut eliminated_by = None;

    for column in &layout.filters {
        let Some(role) = base.role(column) else {
            debug!(column = column.as_str(), table = base.kind().label(), "filter column not in table");
            continue;
        };
        let domain = match ColumnDomain::observe(base, column, role) {
            Ok(domain) => domain,
            Err(e) => {
                notices.push(e);
                continue;
            }
        };
        let raw = store.get(layout.page, column, &domain);
        match predicate_for(column, role, &domain, raw.as_ref()) {
            BuiltPredicate::Apply(predicate) => {
                frame = apply_predicates(&frame, std::slice::from_ref(&predicate))?;
                applied.push(predicate);
                if frame.height() == 0 {
                    eliminated_by = Some(column.clone());
                    break;
                }
            }
            BuiltPredicate::Skip(Some(notice)) => notices.push(notice),
            BuiltPredicate::Skip(None) => {}
        }
    }

    debug!(
        page = layout.page.title(),
        base_rows = base.height(),
        rows = frame.height(),
        filters = applied.len(),
        "applied filters"
    );

    Ok(FilteredView {
        page: layout.page,
        table: layout.table,
        frame,
        base_rows: base.height(),
        applied,
        eliminated_by,
        notices,
    })
}

/// Everything the sidebar needs to draw one filter control.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterControl {
    pub column: String,
    pub role: ColumnRole,
    pub domain: ColumnDomain,
    pub value: Option<WidgetValue>,
    /// The user has set a value (it may still equal the full range).
    pub active: bool,
}

impl FilterControl {
    pub fn kind(&self) -> Option<WidgetKind> {
        match self.domain {
            ColumnDomain::Degenerate | ColumnDomain::Unfilterable => None,
            _ => WidgetKind::for_role(self.role),
        }
    }

    /// Note shown in place of a control that cannot filter.
    pub fn notice(&self) -> Option<String> {
        match self.domain {
            ColumnDomain::Degenerate if self.role.is_range() => {
                Some(DashboardError::degenerate(&self.column).to_string())
            }
            ColumnDomain::Degenerate => Some("single value, nothing to filter".to_string()),
            ColumnDomain::Unfilterable => Some("not filterable".to_string()),
            _ => None,
        }
    }
}

/// Controls for a page's filter columns present in the table. Registers each
/// column in the store on first render.
pub fn filter_controls(
    base: &Table,
    layout: &PageLayout,
    store: &mut FilterStateStore,
) -> Vec<FilterControl> {
    let mut controls = Vec::new();
    for column in &layout.filters {
        let Some(role) = base.role(column) else {
            continue;
        };
        let Ok(domain) = ColumnDomain::observe(base, column, role) else {
            continue;
        };
        store.register(layout.page, column);
        let value = store.get(layout.page, column, &domain);
        let active = store.active_columns(layout.page).contains(&column.as_str());
        controls.push(FilterControl {
            column: column.clone(),
            role,
            domain,
            value,
            active,
        });
    }
    controls
}
