//! Terminal rendering of chart figures.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    symbols,
    text::Line,
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph, Widget,
        Wrap,
    },
};

use crate::catalog::{date_to_days, days_to_date};
use crate::charts::{
    format_tick, nice_ticks, BoxStats, BoxplotPanel, Figure, HistogramPanel, LinePanel, Panel,
    ScatterPanel,
};

/// A figure drawn into a grid of bordered cells.
pub struct FigureView<'a> {
    pub figure: &'a Figure,
    pub series: Color,
    pub trend: Color,
    pub outlier: Color,
    pub text: Color,
}

impl<'a> FigureView<'a> {
    pub fn new(figure: &'a Figure) -> Self {
        Self {
            figure,
            series: Color::Blue,
            trend: Color::Red,
            outlier: Color::Red,
            text: Color::White,
        }
    }

    pub fn with_colors(mut self, series: Color, trend: Color, outlier: Color, text: Color) -> Self {
        self.series = series;
        self.trend = trend;
        self.outlier = outlier;
        self.text = text;
        self
    }
}

fn grid(area: Rect, rows: usize, cols: usize) -> Vec<Rect> {
    let row_areas = Layout::new(Direction::Vertical, vec![Constraint::Fill(1); rows.max(1)]).split(area);
    row_areas
        .iter()
        .flat_map(|row| {
            Layout::new(Direction::Horizontal, vec![Constraint::Fill(1); cols.max(1)])
                .split(*row)
                .to_vec()
        })
        .collect()
}

fn bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if hi > lo {
        [lo, hi]
    } else {
        [lo - 0.5, lo + 0.5]
    }
}

fn tick_labels(range: [f64; 2], format: impl Fn(f64) -> String) -> Vec<String> {
    let ticks = nice_ticks(range[0], range[1], 3);
    if ticks.len() >= 2 {
        ticks.into_iter().map(format).collect()
    } else {
        vec![format(range[0]), format(range[1])]
    }
}

impl Widget for &FigureView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.figure.title.as_str());
        let inner = block.inner(area);
        block.render(area, buf);

        for (cell, panel) in grid(inner, self.figure.rows, self.figure.cols)
            .into_iter()
            .zip(&self.figure.panels)
        {
            match panel {
                Panel::Histogram(p) => self.histogram(p, cell, buf),
                Panel::Boxplot(p) => self.boxplot(p, cell, buf),
                Panel::Scatter(p) => self.scatter(p, cell, buf),
                Panel::Line(p) => self.line(p, cell, buf),
                Panel::Hidden(_) => {}
            }
        }
    }
}

impl FigureView<'_> {
    fn histogram(&self, panel: &HistogramPanel, area: Rect, buf: &mut Buffer) {
        let block = Block::bordered().title(panel.title.as_str());
        let inner = block.inner(area);
        block.render(area, buf);
        let bins = panel.counts.len().max(1) as u16;
        let bar_width = (inner.width / bins).max(1);
        let bars: Vec<Bar> = panel
            .bins()
            .map(|(left, _, count)| {
                Bar::default()
                    .value(count as u64)
                    .label(Line::from(format_tick(left)))
                    .style(Style::default().fg(self.series))
            })
            .collect();
        BarChart::default()
            .data(BarGroup::default().bars(&bars))
            .bar_width(bar_width.saturating_sub(1).max(1))
            .bar_gap(u16::from(bar_width > 1))
            .render(inner, buf);
    }

    fn boxplot(&self, panel: &BoxplotPanel, area: Rect, buf: &mut Buffer) {
        let block = Block::bordered().title(panel.title.as_str());
        let inner = block.inner(area);
        block.render(area, buf);
        let stats = &panel.stats;
        let mut lines = vec![Line::styled(
            box_line(stats, inner.width as usize),
            Style::default().fg(self.series),
        )];
        lines.push(Line::styled(
            format!(
                "min {}  q1 {}  median {}  q3 {}  max {}",
                format_tick(stats.lower_whisker),
                format_tick(stats.q1),
                format_tick(stats.median),
                format_tick(stats.q3),
                format_tick(stats.upper_whisker)
            ),
            Style::default().fg(self.text),
        ));
        if !stats.outliers.is_empty() {
            lines.push(Line::styled(
                format!("{} outliers", stats.outliers.len()),
                Style::default().fg(self.outlier),
            ));
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .render(inner, buf);
    }

    fn scatter(&self, panel: &ScatterPanel, area: Rect, buf: &mut Buffer) {
        let x = bounds(panel.points.iter().map(|p| p.0));
        let y = bounds(panel.points.iter().map(|p| p.1));
        let trend: Vec<(f64, f64)> = panel
            .trend
            .map(|t| vec![(x[0], t.at(x[0])), (x[1], t.at(x[1]))])
            .unwrap_or_default();
        let mut datasets = vec![Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(self.series))
            .data(&panel.points)];
        if !trend.is_empty() {
            datasets.push(
                Dataset::default()
                    .name("trend")
                    .marker(symbols::Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(self.trend))
                    .data(&trend),
            );
        }
        Chart::new(datasets)
            .block(Block::bordered().title(panel.title.as_str()))
            .x_axis(self.axis(panel.x_label.as_str(), x, tick_labels(x, format_tick)))
            .y_axis(self.axis(panel.y_label.as_str(), y, tick_labels(y, format_tick)))
            .render(area, buf);
    }

    fn line(&self, panel: &LinePanel, area: Rect, buf: &mut Buffer) {
        let points: Vec<(f64, f64)> = panel
            .points
            .iter()
            .map(|(date, v)| (date_to_days(*date) as f64, *v))
            .collect();
        let x = bounds(points.iter().map(|p| p.0));
        let y = bounds(points.iter().map(|p| p.1).chain(std::iter::once(0.0)));
        let month = |v: f64| {
            days_to_date(v.round() as i32)
                .map(|d| d.format("%Y-%m").to_string())
                .unwrap_or_default()
        };
        let x_labels = vec![month(x[0]), month((x[0] + x[1]) / 2.0), month(x[1])];
        let dataset = Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(self.series))
            .data(&points);
        Chart::new(vec![dataset])
            .block(Block::bordered().title(panel.title.as_str()))
            .x_axis(self.axis(panel.x_label.as_str(), x, x_labels))
            .y_axis(self.axis(panel.y_label.as_str(), y, tick_labels(y, format_tick)))
            .render(area, buf);
    }

    fn axis<'a>(&self, title: &'a str, bounds: [f64; 2], labels: Vec<String>) -> Axis<'a> {
        Axis::default()
            .title(title)
            .bounds(bounds)
            .style(Style::default().fg(self.text))
            .labels(labels)
    }
}

/// One-line text box plot `├──[  |  ]──┤` scaled to `width` characters.
///
/// Interpolated quartiles may fall outside the whiskers, so the scale spans both.
fn box_line(stats: &BoxStats, width: usize) -> String {
    if width < 5 {
        return String::new();
    }
    let lo = stats.lower_whisker.min(stats.q1);
    let hi = stats.upper_whisker.max(stats.q3);
    let span = hi - lo;
    let last = width - 1;
    let pos = |v: f64| {
        if span > 0.0 && v.is_finite() {
            ((((v - lo) / span) * last as f64).round().max(0.0) as usize).min(last)
        } else {
            width / 2
        }
    };
    let (left, right) = (pos(stats.lower_whisker), pos(stats.upper_whisker));
    let (q1, median, q3) = (pos(stats.q1), pos(stats.median), pos(stats.q3));
    let mut line = vec![' '; width];
    for (i, c) in line.iter_mut().enumerate() {
        if (i >= left.min(q1) && i < q1) || (i > q3 && i <= right.max(q3)) {
            *c = '─';
        }
    }
    line[left] = '├';
    line[right] = '┤';
    line[q1] = '[';
    line[q3] = ']';
    line[median] = '|';
    line.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_box_line_marks_quartiles() {
        let stats = BoxStats::from_values(&[0.0, 25.0, 50.0, 75.0, 100.0]).unwrap();
        let line = box_line(&stats, 11);
        assert_eq!(line.chars().count(), 11);
        assert!(line.starts_with('├'));
        assert!(line.ends_with('┤'));
        assert!(line.contains('['));
        assert!(line.contains('|'));
    }

    #[test]
    fn test_box_line_with_outlier_above_upper_whisker() {
        let stats = BoxStats::from_values(&[0.0, 0.0, 10.0, 70000.0]).unwrap();
        assert!(stats.q3 > stats.upper_whisker);
        for width in [5, 11, 40, 120] {
            let line = box_line(&stats, width);
            assert_eq!(line.chars().count(), width);
            assert!(line.contains(']'));
        }
    }

    #[test]
    fn test_grid_splits_rows_and_columns() {
        let cells = grid(Rect::new(0, 0, 40, 20), 2, 3);
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0].y, 0);
        assert_eq!(cells[3].y, 10);
    }

    #[test]
    fn test_renders_line_panel_without_panicking() {
        let figure = Figure {
            title: "Monthly NumFlights".to_string(),
            rows: 1,
            cols: 1,
            panels: vec![Panel::Line(LinePanel {
                title: "Monthly NumFlights".to_string(),
                x_label: "Month".to_string(),
                y_label: "NumFlights".to_string(),
                points: vec![
                    (NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(), 4.0),
                    (NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(), 9.0),
                ],
            })],
        };
        let area = Rect::new(0, 0, 60, 20);
        let mut buf = Buffer::empty(area);
        (&FigureView::new(&figure)).render(area, &mut buf);
        let top: String = (0..60).map(|x| buf[(x, 0)].symbol().to_string()).collect();
        assert!(top.contains("Monthly NumFlights"));
    }
}
