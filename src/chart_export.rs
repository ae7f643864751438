//! Figure export to PNG (plotters bitmap) and SVG (plotters svg).

use color_eyre::eyre::eyre;
use color_eyre::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

use crate::catalog::{date_to_days, days_to_date};
use crate::charts::{BoxplotPanel, Figure, HistogramPanel, LinePanel, Panel, ScatterPanel};

const SERIES: RGBColor = RGBColor(0x00, 0x62, 0xFF);
const TREND: RGBColor = RED;
const CAPTION_FONT: (&str, u32) = ("sans-serif", 20);

/// Export format for figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartExportFormat {
    Png,
    Svg,
}

impl ChartExportFormat {
    pub const ALL: [Self; 2] = [Self::Png, Self::Svg];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|f| ext.eq_ignore_ascii_case(f.extension()))
    }
}

/// Write `figure` to `path`; the format follows the file extension.
pub fn write_figure(path: &Path, figure: &Figure, size: (u32, u32)) -> Result<()> {
    let format = ChartExportFormat::from_path(path).ok_or_else(|| {
        eyre!(
            "Unsupported chart file type: {} (use .png or .svg)",
            path.display()
        )
    })?;
    if figure.visible_panels().next().is_none() {
        return Err(eyre!("No data to export"));
    }

    match format {
        ChartExportFormat::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_figure(&root, figure)?;
            root.present()?;
        }
        ChartExportFormat::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_figure(&root, figure)?;
            root.present()?;
        }
    }
    Ok(())
}

fn draw_figure<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, figure: &Figure) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let body = root.titled(&figure.title, ("sans-serif", 32))?;
    let cells = body.split_evenly((figure.rows, figure.cols));
    for (area, panel) in cells.iter().zip(&figure.panels) {
        match panel {
            Panel::Histogram(p) => draw_histogram(area, p)?,
            Panel::Boxplot(p) => draw_boxplot(area, p)?,
            Panel::Scatter(p) => draw_scatter(area, p)?,
            Panel::Line(p) => draw_line(area, p)?,
            Panel::Hidden(_) => {}
        }
    }
    Ok(())
}

/// Axis range with a little headroom; a single value gets a unit range.
fn padded(lo: f64, hi: f64) -> std::ops::Range<f64> {
    if hi > lo {
        let pad = (hi - lo) * 0.05;
        (lo - pad)..(hi + pad)
    } else {
        (lo - 1.0)..(hi + 1.0)
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn draw_histogram<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &HistogramPanel,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let (Some(&x0), Some(&x1)) = (panel.edges.first(), panel.edges.last()) else {
        return Ok(());
    };
    let y_max = (panel.max_count() as f64 * 1.1).max(1.0);
    let mut chart = ChartBuilder::on(area)
        .caption(panel.title.as_str(), CAPTION_FONT)
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x0..x1, 0.0..y_max)?;
    chart.configure_mesh().y_desc("Count").draw()?;

    chart.draw_series(panel.bins().map(|(left, right, count)| {
        Rectangle::new([(left, 0.0), (right, count as f64)], SERIES.mix(0.7).filled())
    }))?;
    chart.draw_series(panel.bins().map(|(left, right, count)| {
        Rectangle::new([(left, 0.0), (right, count as f64)], BLACK.stroke_width(1))
    }))?;
    if let Some(curve) = &panel.kde {
        chart.draw_series(LineSeries::new(curve.iter().copied(), SERIES.stroke_width(2)))?;
    }
    Ok(())
}

fn draw_boxplot<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, panel: &BoxplotPanel) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let stats = &panel.stats;
    let (lo, hi) = stats.extent();
    let mut chart = ChartBuilder::on(area)
        .caption(panel.title.as_str(), CAPTION_FONT)
        .margin(10)
        .x_label_area_size(30)
        .build_cartesian_2d(padded(lo, hi), 0.0..1.0)?;
    chart
        .configure_mesh()
        .disable_y_mesh()
        .disable_y_axis()
        .draw()?;

    let line = |x0: f64, y0: f64, x1: f64, y1: f64, width: u32| {
        PathElement::new(vec![(x0, y0), (x1, y1)], BLACK.stroke_width(width))
    };
    chart.draw_series(std::iter::once(Rectangle::new(
        [(stats.q1, 0.3), (stats.q3, 0.7)],
        SERIES.filled(),
    )))?;
    chart.draw_series([
        line(stats.lower_whisker, 0.5, stats.q1, 0.5, 1),
        line(stats.q3, 0.5, stats.upper_whisker, 0.5, 1),
        line(stats.lower_whisker, 0.4, stats.lower_whisker, 0.6, 1),
        line(stats.upper_whisker, 0.4, stats.upper_whisker, 0.6, 1),
        line(stats.median, 0.3, stats.median, 0.7, 3),
    ])?;
    chart.draw_series(
        stats
            .outliers
            .iter()
            .map(|x| Circle::new((*x, 0.5), 3, BLACK.stroke_width(1))),
    )?;
    Ok(())
}

fn draw_scatter<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, panel: &ScatterPanel) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let (x_lo, x_hi) = bounds(panel.points.iter().map(|p| p.0));
    let (y_lo, y_hi) = bounds(panel.points.iter().map(|p| p.1));
    let mut chart = ChartBuilder::on(area)
        .caption(panel.title.as_str(), CAPTION_FONT)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(padded(x_lo, x_hi), padded(y_lo, y_hi))?;
    chart
        .configure_mesh()
        .x_desc(panel.x_label.as_str())
        .y_desc(panel.y_label.as_str())
        .draw()?;

    chart.draw_series(
        panel
            .points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 3, SERIES.mix(0.3).filled())),
    )?;
    if let Some(trend) = panel.trend {
        chart.draw_series(LineSeries::new(
            [(x_lo, trend.at(x_lo)), (x_hi, trend.at(x_hi))],
            TREND.stroke_width(2),
        ))?;
    }
    Ok(())
}

fn draw_line<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, panel: &LinePanel) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let points: Vec<(f64, f64)> = panel
        .points
        .iter()
        .map(|(date, v)| (date_to_days(*date) as f64, *v))
        .collect();
    let (x_lo, x_hi) = bounds(points.iter().map(|p| p.0));
    let (y_lo, y_hi) = bounds(points.iter().map(|p| p.1));
    let month_label = |x: &f64| {
        days_to_date(x.round() as i32)
            .map(|d| d.format("%Y-%m").to_string())
            .unwrap_or_default()
    };
    let mut chart = ChartBuilder::on(area)
        .caption(panel.title.as_str(), CAPTION_FONT)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(padded(x_lo, x_hi), padded(y_lo.min(0.0), y_hi))?;
    chart
        .configure_mesh()
        .x_label_formatter(&month_label)
        .x_desc(panel.x_label.as_str())
        .y_desc(panel.y_label.as_str())
        .draw()?;
    chart.draw_series(LineSeries::new(points.iter().copied(), SERIES.stroke_width(2)))?;
    chart.draw_series(
        points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 3, SERIES.filled())),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_follows_extension() {
        assert_eq!(
            ChartExportFormat::from_path(Path::new("out/histograms.PNG")),
            Some(ChartExportFormat::Png)
        );
        assert_eq!(
            ChartExportFormat::from_path(Path::new("locations.svg")),
            Some(ChartExportFormat::Svg)
        );
        assert_eq!(ChartExportFormat::from_path(Path::new("chart.eps")), None);
    }

    #[test]
    fn test_rejects_unknown_extension_and_blank_figures() {
        let dir = tempfile::tempdir().expect("temp dir");
        let figure = Figure {
            title: "Empty".to_string(),
            rows: 1,
            cols: 1,
            panels: vec![Panel::Hidden("Income".to_string())],
        };
        let path = dir.path().join("chart.svg");
        assert!(write_figure(&path, &figure, (640, 480)).is_err());
        assert!(!path.exists());
        assert!(write_figure(&dir.path().join("chart.eps"), &figure, (640, 480)).is_err());
    }

    #[test]
    fn test_padded_range_handles_single_value() {
        assert_eq!(padded(3.0, 3.0), 2.0..4.0);
        let range = padded(0.0, 100.0);
        assert!(range.start < 0.0 && range.end > 100.0);
    }
}
