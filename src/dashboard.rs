//! One render pass per interaction: filter state in, page contents out.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing::{debug, warn};

use crate::catalog::{Catalog, TableKind};
use crate::charts::{self, Figure};
use crate::config::{ChartsConfig, DataConfig};
use crate::engine::{self, apply_filters, filter_controls, FilterControl, FilteredView, PageLayout};
use crate::error::{user_message, ChartError, DashboardError};
use crate::predicate::{WidgetKind, WidgetValue};
use crate::state::{FilterStateStore, Page};
use crate::summary::{self, ChartSelection, Metrics};

/// Figures drawn on the Insights page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FigureKind {
    Histograms,
    Boxplots,
    Locations,
    MonthlyTrend,
}

impl FigureKind {
    pub const ALL: [Self; 4] = [
        Self::Histograms,
        Self::Boxplots,
        Self::Locations,
        Self::MonthlyTrend,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Histograms => "Histograms",
            Self::Boxplots => "Box Plots",
            Self::Locations => "Customer Locations",
            Self::MonthlyTrend => "Monthly Flights",
        }
    }

    /// Base name used when the figure is written to disk.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Histograms => "histograms",
            Self::Boxplots => "boxplots",
            Self::Locations => "locations",
            Self::MonthlyTrend => "monthly-flights",
        }
    }
}

/// Everything a page shows after a render pass.
#[derive(Debug)]
pub struct PageView {
    pub page: Page,
    pub table: TableKind,
    pub base_rows: usize,
    pub controls: Vec<FilterControl>,
    /// `None` when the filter pass itself failed; the failure is in `notices`.
    pub filtered: Option<FilteredView>,
    pub metrics: Option<Metrics>,
    pub figures: Vec<(FigureKind, Result<Figure, ChartError>)>,
    pub notices: Vec<String>,
}

impl PageView {
    pub fn is_empty(&self) -> bool {
        self.filtered.as_ref().is_some_and(FilteredView::is_empty)
    }

    pub fn rows(&self) -> usize {
        self.filtered.as_ref().map_or(0, FilteredView::height)
    }
}

/// The loaded catalog plus the filter state of every page.
#[derive(Debug)]
pub struct Dashboard {
    catalog: Catalog,
    store: FilterStateStore,
    charts: ChartsConfig,
    identifier: String,
}

impl Dashboard {
    pub fn new(catalog: Catalog, data: &DataConfig, charts: ChartsConfig) -> Self {
        Self {
            catalog,
            store: FilterStateStore::new(),
            charts,
            identifier: data.identifier.clone(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &FilterStateStore {
        &self.store
    }

    pub fn charts_config(&self) -> &ChartsConfig {
        &self.charts
    }

    pub fn describe(&self, column: &str) -> Option<String> {
        self.catalog.describe(column)
    }

    /// Recompute the page from scratch.
    pub fn render(&mut self, page: Page) -> PageView {
        let layout = PageLayout::for_page(page);
        let base = self.catalog.table(layout.table);
        let controls = filter_controls(base, &layout, &mut self.store);
        if let Ok(snapshot) = self.store.snapshot(page) {
            debug!(page = page.title(), state = %snapshot, "render pass");
        }

        let mut notices: Vec<String> = controls.iter().filter_map(FilterControl::notice).collect();
        let mut view = PageView {
            page,
            table: layout.table,
            base_rows: base.height(),
            controls,
            filtered: None,
            metrics: None,
            figures: Vec::new(),
            notices: Vec::new(),
        };

        let filtered = match apply_filters(base, &layout, &self.store) {
            Ok(filtered) => filtered,
            Err(e) => {
                warn!(page = page.title(), error = %e, "filter pass failed");
                notices.push(user_message(&e));
                view.notices = notices;
                return view;
            }
        };

        if filtered.is_empty() {
            notices.push(user_message(&DashboardError::EmptyResult));
        } else {
            match summary::summarize(&filtered, &layout.metrics) {
                Ok(metrics) => {
                    notices.extend(metrics.notices.iter().map(user_message));
                    view.metrics = Some(metrics);
                }
                Err(e) => notices.push(user_message(&e)),
            }
            if page == Page::Insights {
                view.figures = self.insight_figures(&filtered);
            }
        }
        notices.extend(
            filtered
                .notices
                .iter()
                .filter(|n| !matches!(n, DashboardError::DegenerateRange { .. }))
                .map(user_message),
        );
        view.filtered = Some(filtered);
        view.notices = notices;
        view
    }

    fn insight_figures(&self, filtered: &FilteredView) -> Vec<(FigureKind, Result<Figure, ChartError>)> {
        let customers = self.catalog.customers();
        let numeric = customers.numeric_columns();
        let continuous = customers.continuous_columns();
        let selection = ChartSelection {
            numeric: numeric.clone(),
            categorical: Vec::new(),
        };

        let input = summary::prepare_chart_inputs(filtered, &selection);
        let histograms = input
            .as_ref()
            .map_err(|e| ChartError::NoData(e.to_string()))
            .and_then(|input| {
                charts::histogram_grid(input, &numeric, &continuous, self.charts.bins, self.charts.kde)
            });
        let boxplots = input
            .as_ref()
            .map_err(|e| ChartError::NoData(e.to_string()))
            .and_then(|input| charts::boxplot_grid(input, &continuous, self.charts.boxplot_rows));
        let locations = charts::location_scatter(
            &filtered.frame,
            "Longitude",
            "Latitude",
            self.charts.show_trend,
        );
        let trend = engine::restrict_to_ids(self.catalog.flights().frame(), &filtered.frame, &self.identifier)
            .map_err(|e| ChartError::MissingColumn(e.to_string()))
            .and_then(|flights| charts::monthly_trend_line(&flights, "YearMonthDate", "NumFlights"));

        let figures = vec![
            (FigureKind::Histograms, histograms),
            (FigureKind::Boxplots, boxplots),
            (FigureKind::Locations, locations),
            (FigureKind::MonthlyTrend, trend),
        ];
        for (kind, figure) in &figures {
            if let Err(e) = figure {
                warn!(figure = kind.title(), error = %e, "chart unavailable");
            }
        }
        figures
    }

    pub fn set_filter(&mut self, page: Page, column: &str, value: WidgetValue) {
        self.store.set(page, column, value);
    }

    pub fn reset_column(&mut self, page: Page, column: &str) -> bool {
        self.store.reset_column(page, column)
    }

    /// Clear All Filters for `page`.
    pub fn reset_page(&mut self, page: Page) -> usize {
        self.store.reset_page(page)
    }

    /// Apply `COLUMN=SPEC` arguments to `page`, e.g. `Income=20000..90000`
    /// or `Gender=female,male`.
    pub fn apply_filter_args(&mut self, page: Page, filters: &[String]) -> Result<()> {
        let layout = PageLayout::for_page(page);
        let base = self.catalog.table(layout.table);
        for filter in filters {
            let (column, spec) = filter
                .split_once('=')
                .ok_or_else(|| eyre!("Invalid filter `{filter}`: expected COLUMN=VALUE"))?;
            let column = column.trim();
            if !layout.filters.iter().any(|c| c == column) {
                return Err(eyre!(
                    "`{column}` is not a filter on the {} page (available: {})",
                    page.title(),
                    layout.filters.join(", ")
                ));
            }
            let kind = base
                .role(column)
                .and_then(WidgetKind::for_role)
                .ok_or_else(|| eyre!("`{column}` cannot be filtered in this dataset"))?;
            self.store.set(page, column, WidgetValue::parse(kind, spec));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::MetricValue;
    use polars::prelude::*;

    fn dashboard() -> Dashboard {
        let flights = df!(
            "Loyalty#" => &[101i64, 101, 102, 103],
            "Year" => &[2017i64, 2017, 2018, 2018],
            "Month" => &[1i64, 2, 1, 3],
            "YearMonthDate" => &["2017-01-01", "2017-02-01", "2018-01-01", "2018-03-01"],
            "NumFlights" => &[2.0, 3.0, 4.0, 1.0],
            "DistanceKM" => &[1200.0, 900.0, 4000.0, 300.0],
        )
        .unwrap();
        let customers = df!(
            "Loyalty#" => &[101i64, 102, 103],
            "Province or State" => &["Ontario", "Quebec", "Ontario"],
            "Gender" => &["female", "male", "female"],
            "Education" => &["Bachelor", "College", "Bachelor"],
            "LoyaltyStatus" => &["Star", "Nova", "Aurora"],
            "Latitude" => &[45.4, 46.8, 43.7],
            "Longitude" => &[-75.7, -71.2, -79.4],
            "Income" => &[20000.0, 60000.0, 90000.0],
            "Customer Lifetime Value" => &[3000.0, 4000.0, 8000.0],
        )
        .unwrap();
        let metadata = df!("column_1" => &["Income"], "column_2" => &["Yearly income"]).unwrap();
        let data = DataConfig::default();
        let catalog = Catalog::from_frames(flights, customers, metadata, &data).unwrap();
        Dashboard::new(catalog, &data, ChartsConfig::default())
    }

    #[test]
    fn test_insights_render_builds_every_figure() {
        let mut dashboard = dashboard();
        let view = dashboard.render(Page::Insights);
        assert_eq!(view.rows(), 3);
        assert_eq!(view.figures.len(), FigureKind::ALL.len());
        assert!(view.figures.iter().all(|(_, figure)| figure.is_ok()));
        assert_eq!(
            view.metrics.as_ref().and_then(|m| m.get("Top Education")),
            Some(&MetricValue::Text("Bachelor".to_string()))
        );
    }

    #[test]
    fn test_filter_args_drive_next_render() {
        let mut dashboard = dashboard();
        dashboard
            .apply_filter_args(Page::Insights, &["Gender=female".to_string()])
            .unwrap();
        let view = dashboard.render(Page::Insights);
        assert_eq!(view.rows(), 2);

        // Other pages keep their own state
        assert_eq!(dashboard.render(Page::CustomerExplorer).rows(), 3);

        assert_eq!(dashboard.reset_page(Page::Insights), 1);
        assert_eq!(dashboard.render(Page::Insights).rows(), 3);
    }

    #[test]
    fn test_filter_args_reject_unknown_columns() {
        let mut dashboard = dashboard();
        assert!(dashboard
            .apply_filter_args(Page::FlightsExplorer, &["Gender=female".to_string()])
            .is_err());
        assert!(dashboard
            .apply_filter_args(Page::FlightsExplorer, &["NumFlights".to_string()])
            .is_err());
    }

    #[test]
    fn test_empty_result_skips_metrics_and_figures() {
        let mut dashboard = dashboard();
        dashboard.set_filter(
            Page::Insights,
            "Income",
            WidgetValue::NumberRange(Some(30000.0), Some(40000.0)),
        );
        let view = dashboard.render(Page::Insights);
        assert!(view.is_empty());
        assert!(view.metrics.is_none());
        assert!(view.figures.is_empty());
        assert!(view
            .notices
            .contains(&user_message(&DashboardError::EmptyResult)));
    }

    #[test]
    fn test_describe_uses_metadata() {
        let dashboard = dashboard();
        assert_eq!(dashboard.describe("Income").as_deref(), Some("Yearly income"));
        assert_eq!(dashboard.describe("Gender"), None);
    }
}
