use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Paragraph, Widget},
};

use crate::summary::Metrics;

/// Row of metric cards above the data table.
pub struct MetricsBar<'a> {
    pub metrics: Option<&'a Metrics>,
    pub border: Color,
    pub value: Color,
    pub dimmed: Color,
}

impl<'a> MetricsBar<'a> {
    pub fn new(metrics: Option<&'a Metrics>) -> Self {
        Self {
            metrics,
            border: Color::Cyan,
            value: Color::White,
            dimmed: Color::DarkGray,
        }
    }

    pub fn with_colors(mut self, border: Color, value: Color, dimmed: Color) -> Self {
        self.border = border;
        self.value = value;
        self.dimmed = dimmed;
        self
    }
}

impl Widget for &MetricsBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(metrics) = self.metrics.filter(|m| !m.values.is_empty()) else {
            Paragraph::new("No metrics")
                .style(Style::default().fg(self.dimmed))
                .block(Block::bordered().border_style(Style::default().fg(self.dimmed)))
                .render(area, buf);
            return;
        };
        let cells = Layout::new(
            Direction::Horizontal,
            vec![Constraint::Fill(1); metrics.values.len()],
        )
        .split(area);
        for (cell, metric) in cells.iter().zip(&metrics.values) {
            Paragraph::new(Line::styled(
                metric.value.to_string(),
                Style::default().fg(self.value).add_modifier(Modifier::BOLD),
            ))
            .centered()
            .block(
                Block::bordered()
                    .title(metric.label.as_str())
                    .border_style(Style::default().fg(self.border)),
            )
            .render(*cell, buf);
        }
    }
}
