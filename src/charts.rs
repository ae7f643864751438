//! Figure builders. Pure: column data in, a `Figure` description out.
//!
//! Rendering lives elsewhere: `chart_export` draws figures to PNG/SVG and
//! `widgets::figure` draws them in the terminal.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::collections::BTreeMap;

use crate::catalog;
use crate::error::ChartError;
use crate::summary::ChartInput;

/// A grid of panels with a title, laid out row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub title: String,
    pub rows: usize,
    pub cols: usize,
    pub panels: Vec<Panel>,
}

impl Figure {
    fn single(title: impl Into<String>, panel: Panel) -> Self {
        Self {
            title: title.into(),
            rows: 1,
            cols: 1,
            panels: vec![panel],
        }
    }

    pub fn visible_panels(&self) -> impl Iterator<Item = &Panel> {
        self.panels.iter().filter(|p| !matches!(p, Panel::Hidden(_)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Panel {
    Histogram(HistogramPanel),
    Boxplot(BoxplotPanel),
    Scatter(ScatterPanel),
    Line(LinePanel),
    /// A grid cell left blank (missing or empty feature, or padding).
    Hidden(String),
}

impl Panel {
    pub fn title(&self) -> &str {
        match self {
            Self::Histogram(p) => &p.title,
            Self::Boxplot(p) => &p.title,
            Self::Scatter(p) => &p.title,
            Self::Line(p) => &p.title,
            Self::Hidden(title) => title,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramPanel {
    pub title: String,
    /// `counts.len() + 1` bin edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    /// Density estimate scaled to counts, for continuous features.
    pub kde: Option<Vec<(f64, f64)>>,
}

impl HistogramPanel {
    /// (left edge, right edge, count) per bin.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, usize)> + '_ {
        self.edges
            .windows(2)
            .zip(&self.counts)
            .map(|(edge, count)| (edge[0], edge[1], *count))
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Five-number summary with Tukey whiskers.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    /// Values beyond 1.5 IQR from the quartiles.
    pub outliers: Vec<f64>,
}

impl BoxStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);
        let q1 = quantile(&sorted, 0.25);
        let median = quantile(&sorted, 0.5);
        let q3 = quantile(&sorted, 0.75);
        let iqr = q3 - q1;
        let (low_fence, high_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
        let mut inside = sorted
            .iter()
            .copied()
            .filter(|v| *v >= low_fence && *v <= high_fence);
        let lower_whisker = inside.next().unwrap_or(q1);
        let upper_whisker = inside.last().unwrap_or(lower_whisker);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|v| *v < low_fence || *v > high_fence)
            .collect();
        Some(Self {
            lower_whisker,
            q1,
            median,
            q3,
            upper_whisker,
            outliers,
        })
    }

    /// Smallest and largest value drawn, outliers included.
    pub fn extent(&self) -> (f64, f64) {
        self.outliers.iter().fold(
            (self.lower_whisker, self.upper_whisker),
            |(lo, hi), v| (lo.min(*v), hi.max(*v)),
        )
    }
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxplotPanel {
    pub title: String,
    pub stats: BoxStats,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
}

impl TrendLine {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPanel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(f64, f64)>,
    pub trend: Option<TrendLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinePanel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(NaiveDate, f64)>,
}

fn grid_cells(n: usize, rows: usize) -> (usize, usize) {
    let rows = rows.max(1);
    (rows, n.div_ceil(rows).max(1))
}

fn pad_hidden(panels: &mut Vec<Panel>, cells: usize) {
    while panels.len() < cells {
        panels.push(Panel::Hidden(String::new()));
    }
}

/// Histograms of `numeric` features, two rows. Continuous features get a density curve when `kde`.
pub fn histogram_grid(
    input: &ChartInput,
    numeric: &[String],
    continuous: &[String],
    bins: usize,
    kde: bool,
) -> Result<Figure, ChartError> {
    if numeric.is_empty() {
        return Err(ChartError::NoFeatures("histograms"));
    }
    let (rows, cols) = grid_cells(numeric.len(), 2);
    let mut panels: Vec<Panel> = numeric
        .iter()
        .map(|feature| match input.values(feature) {
            Some(values) if !values.is_empty() => {
                let (edges, counts) = histogram(values, bins.max(1));
                let curve = if kde && continuous.contains(feature) {
                    let width = edges[1] - edges[0];
                    density_curve(values, edges[0], edges[edges.len() - 1], width)
                } else {
                    None
                };
                Panel::Histogram(HistogramPanel {
                    title: feature.clone(),
                    edges,
                    counts,
                    kde: curve,
                })
            }
            _ => Panel::Hidden(feature.clone()),
        })
        .collect();
    pad_hidden(&mut panels, rows * cols);
    Ok(Figure {
        title: "Metric Variables' Histograms".to_string(),
        rows,
        cols,
        panels,
    })
}

/// Equal-width bins over the value range; a constant column gets a unit-wide range.
pub fn histogram(values: &[f64], bins: usize) -> (Vec<f64>, Vec<usize>) {
    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if lo >= hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let edges = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0; bins];
    for v in values {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    (edges, counts)
}

/// Gaussian KDE with Scott's bandwidth, scaled to histogram counts.
fn density_curve(values: &[f64], lo: f64, hi: f64, bin_width: f64) -> Option<Vec<(f64, f64)>> {
    const STEPS: usize = 100;
    let n = values.len() as f64;
    let std = std_dev(values)?;
    if std <= 0.0 {
        return None;
    }
    let bandwidth = std * n.powf(-0.2);
    let norm = 1.0 / (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let curve = (0..=STEPS)
        .map(|i| {
            let x = lo + (hi - lo) * i as f64 / STEPS as f64;
            let density: f64 = values
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm;
            (x, density * n * bin_width)
        })
        .collect();
    Some(curve)
}

/// Sample standard deviation, `None` below two values.
fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

/// Box plots of `columns` over `rows` grid rows. Missing or empty features become hidden cells.
pub fn boxplot_grid(
    input: &ChartInput,
    columns: &[String],
    rows: usize,
) -> Result<Figure, ChartError> {
    if columns.is_empty() {
        return Err(ChartError::NoFeatures("boxplots"));
    }
    let (rows, cols) = grid_cells(columns.len(), rows);
    let mut panels: Vec<Panel> = columns
        .iter()
        .map(|feature| {
            match input.values(feature).and_then(BoxStats::from_values) {
                Some(stats) => Panel::Boxplot(BoxplotPanel {
                    title: feature.clone(),
                    stats,
                }),
                None => Panel::Hidden(feature.clone()),
            }
        })
        .collect();
    pad_hidden(&mut panels, rows * cols);
    Ok(Figure {
        title: "Metric Variables' Box Plots".to_string(),
        rows,
        cols,
        panels,
    })
}

fn require_column(frame: &DataFrame, column: &str) -> Result<Series, ChartError> {
    frame
        .column(column)
        .map(|c| c.as_materialized_series().clone())
        .map_err(|_| ChartError::MissingColumn(column.to_string()))
}

/// Longitude/latitude scatter of every row with both coordinates, with an optional fitted line.
pub fn location_scatter(
    frame: &DataFrame,
    lon_column: &str,
    lat_column: &str,
    show_trend: bool,
) -> Result<Figure, ChartError> {
    let lon = require_column(frame, lon_column)?;
    let lat = require_column(frame, lat_column)?;
    let not_numeric = |_| ChartError::NoData("coordinates (non-numeric column)".to_string());
    let xs = catalog::float_values(&lon).map_err(not_numeric)?;
    let ys = catalog::float_values(&lat).map_err(not_numeric)?;

    let points: Vec<(f64, f64)> = xs
        .into_iter()
        .zip(ys)
        .filter_map(|(x, y)| Some((x?, y?)))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if points.is_empty() {
        return Err(ChartError::NoData("scatter plot".to_string()));
    }

    let trend = if show_trend { fit_line(&points) } else { None };
    Ok(Figure::single(
        "Customer Locations",
        Panel::Scatter(ScatterPanel {
            title: "Customer Locations".to_string(),
            x_label: lon_column.to_string(),
            y_label: lat_column.to_string(),
            points,
            trend,
        }),
    ))
}

/// Least-squares line; needs two points and spread on both axes.
pub fn fit_line(points: &[(f64, f64)]) -> Option<TrendLine> {
    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    if std_dev(&xs)? <= 0.0 || std_dev(&ys)? <= 0.0 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let (cov, var) = points.iter().fold((0.0, 0.0), |(cov, var), (x, y)| {
        (cov + (x - mean_x) * (y - mean_y), var + (x - mean_x).powi(2))
    });
    let slope = cov / var;
    Some(TrendLine {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

/// Sum of `value_column` per calendar month of `date_column`, in month order.
pub fn monthly_trend_line(
    frame: &DataFrame,
    date_column: &str,
    value_column: &str,
) -> Result<Figure, ChartError> {
    let dates = require_column(frame, date_column)?;
    let values = require_column(frame, value_column)?;
    let dates = catalog::date_values(&dates)
        .map_err(|_| ChartError::NoData(format!("`{date_column}` (not a date column)")))?;
    let values = catalog::float_values(&values)
        .map_err(|_| ChartError::NoData(format!("`{value_column}` (not numeric)")))?;

    let mut months: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in dates.into_iter().zip(values) {
        let (Some(date), Some(value)) = (date, value) else {
            continue;
        };
        if let Some(month) = date.with_day(1) {
            *months.entry(month).or_insert(0.0) += value;
        }
    }
    if months.is_empty() {
        return Err(ChartError::NoData("trend line".to_string()));
    }

    let title = format!("Monthly {value_column}");
    Ok(Figure::single(
        title.clone(),
        Panel::Line(LinePanel {
            title,
            x_label: date_column.to_string(),
            y_label: value_column.to_string(),
            points: months.into_iter().collect(),
        }),
    ))
}

/// Generate "nice" tick values in [min, max] with roughly max_ticks steps.
pub fn nice_ticks(min: f64, max: f64, max_ticks: usize) -> Vec<f64> {
    let range = if max > min { max - min } else { 1.0 };
    if max_ticks == 0 {
        return vec![min];
    }
    let raw_step = range / max_ticks as f64;
    let mag = 10.0_f64.powf(raw_step.log10().floor());
    let norm = raw_step / mag;
    let step = match norm {
        n if n <= 1.0 => mag,
        n if n <= 2.0 => 2.0 * mag,
        n if n <= 5.0 => 5.0 * mag,
        _ => 10.0 * mag,
    };
    let mut ticks = Vec::new();
    let mut v = (min / step).ceil() * step;
    while v <= max + step * 0.001 && ticks.len() <= max_ticks + 1 {
        ticks.push(v);
        v += step;
    }
    if ticks.is_empty() {
        ticks.push(min);
    }
    ticks
}

/// Compact tick label: integer when whole, else one or two decimals.
pub fn format_tick(v: f64) -> String {
    let abs = v.abs();
    if v == 0.0 {
        "0".to_string()
    } else if abs >= 1_000_000.0 {
        format!("{:.1}M", v / 1_000_000.0)
    } else if abs >= 10_000.0 {
        format!("{:.0}k", v / 1_000.0)
    } else if (v - v.round()).abs() < 1e-10 {
        format!("{v:.0}")
    } else if abs >= 1.0 {
        format!("{v:.1}")
    } else {
        format!("{v:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::ChartSelection;

    fn input(frame: &DataFrame, numeric: &[&str]) -> ChartInput {
        let selection = ChartSelection {
            numeric: numeric.iter().map(|s| s.to_string()).collect(),
            categorical: Vec::new(),
        };
        ChartInput::from_frame(frame, &selection).unwrap()
    }

    fn customers() -> DataFrame {
        df!(
            "Latitude" => &[Some(43.65), Some(45.42), None, Some(49.28)],
            "Longitude" => &[Some(-79.38), Some(-75.69), Some(-63.57), Some(-123.12)],
            "Income" => &[Some(10000.0), Some(50000.0), Some(90000.0), None],
            "Empty" => &[None::<f64>, None, None, None],
        )
        .unwrap()
    }

    #[test]
    fn test_scatter_requires_latitude() {
        let frame = customers().drop("Latitude").unwrap();
        assert_eq!(
            location_scatter(&frame, "Longitude", "Latitude", true),
            Err(ChartError::MissingColumn("Latitude".to_string()))
        );
    }

    #[test]
    fn test_scatter_without_pairs_is_no_data() {
        let frame = df!(
            "Latitude" => &[Some(43.0), None],
            "Longitude" => &[None, Some(-79.0)],
        )
        .unwrap();
        assert!(matches!(
            location_scatter(&frame, "Longitude", "Latitude", true),
            Err(ChartError::NoData(_))
        ));
    }

    #[test]
    fn test_scatter_fits_trend_on_complete_pairs() {
        let figure = location_scatter(&customers(), "Longitude", "Latitude", true).unwrap();
        let Panel::Scatter(scatter) = &figure.panels[0] else {
            panic!("expected scatter");
        };
        assert_eq!(scatter.points.len(), 3);
        assert!(scatter.trend.is_some());

        let figure = location_scatter(&customers(), "Longitude", "Latitude", false).unwrap();
        let Panel::Scatter(scatter) = &figure.panels[0] else {
            panic!("expected scatter");
        };
        assert!(scatter.trend.is_none());
    }

    #[test]
    fn test_fit_line_needs_spread() {
        assert_eq!(fit_line(&[(1.0, 2.0)]), None);
        assert_eq!(fit_line(&[(1.0, 2.0), (1.0, 3.0)]), None);
        let line = fit_line(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]).unwrap();
        assert!((line.slope - 2.0).abs() < 1e-12);
        assert!((line.at(3.0) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_boxplot_without_columns_fails() {
        let input = input(&customers(), &[]);
        assert_eq!(
            boxplot_grid(&input, &[], 2),
            Err(ChartError::NoFeatures("boxplots"))
        );
    }

    #[test]
    fn test_boxplot_hides_missing_and_empty_features() {
        let frame = customers();
        let columns: Vec<String> = ["Income", "Empty", "Missing"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let figure = boxplot_grid(&input(&frame, &["Income", "Empty"]), &columns, 2).unwrap();
        assert_eq!((figure.rows, figure.cols), (2, 2));
        assert_eq!(figure.panels.len(), 4);
        assert_eq!(figure.visible_panels().count(), 1);
        assert_eq!(figure.panels[1], Panel::Hidden("Empty".to_string()));
    }

    #[test]
    fn test_box_stats_flag_outliers() {
        let stats = BoxStats::from_values(&[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.q1, 2.0);
        assert_eq!(stats.q3, 4.0);
        assert_eq!(stats.outliers, vec![100.0]);
        assert_eq!(stats.upper_whisker, 4.0);
        assert_eq!(stats.extent(), (1.0, 100.0));
    }

    #[test]
    fn test_histogram_grid_layout() {
        let frame = customers();
        let numeric = vec![
            "Latitude".to_string(),
            "Longitude".to_string(),
            "Income".to_string(),
        ];
        let continuous = vec!["Income".to_string()];
        let figure = histogram_grid(
            &input(&frame, &["Latitude", "Longitude", "Income"]),
            &numeric,
            &continuous,
            10,
            true,
        )
        .unwrap();
        assert_eq!((figure.rows, figure.cols), (2, 2));
        let Panel::Histogram(income) = &figure.panels[2] else {
            panic!("expected histogram");
        };
        assert_eq!(income.counts.len(), 10);
        assert_eq!(income.counts.iter().sum::<usize>(), 3);
        assert!(income.kde.is_some());
        let Panel::Histogram(lat) = &figure.panels[0] else {
            panic!("expected histogram");
        };
        assert!(lat.kde.is_none());
    }

    #[test]
    fn test_histogram_of_constant_values() {
        let (edges, counts) = histogram(&[5.0, 5.0], 4);
        assert_eq!(edges.first(), Some(&4.5));
        assert_eq!(edges.last(), Some(&5.5));
        assert_eq!(counts.iter().sum::<usize>(), 2);
    }

    #[test]
    fn test_monthly_trend_sums_per_month() {
        let dates = Series::new(
            "YearMonthDate".into(),
            vec![
                Some(catalog::date_to_days(NaiveDate::from_ymd_opt(2021, 2, 1).unwrap())),
                Some(catalog::date_to_days(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap())),
                Some(catalog::date_to_days(NaiveDate::from_ymd_opt(2021, 1, 15).unwrap())),
                None,
            ],
        )
        .cast(&DataType::Date)
        .unwrap();
        let mut frame = df!("NumFlights" => &[Some(3.0), Some(1.0), Some(2.0), Some(9.0)]).unwrap();
        frame.with_column(dates).unwrap();

        let figure = monthly_trend_line(&frame, "YearMonthDate", "NumFlights").unwrap();
        let Panel::Line(line) = &figure.panels[0] else {
            panic!("expected line");
        };
        assert_eq!(
            line.points,
            vec![
                (NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(), 3.0),
                (NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(), 3.0),
            ]
        );
        assert_eq!(
            monthly_trend_line(&frame, "YearMonthDate", "PointsRedeemed"),
            Err(ChartError::MissingColumn("PointsRedeemed".to_string()))
        );
    }

    #[test]
    fn test_nice_ticks_cover_range() {
        let ticks = nice_ticks(0.0, 100.0, 5);
        assert_eq!(ticks.first(), Some(&0.0));
        assert_eq!(ticks.last(), Some(&100.0));
        assert_eq!(format_tick(25000.0), "25k");
        assert_eq!(format_tick(2.5), "2.5");
    }
}
