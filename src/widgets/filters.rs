use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph, Widget, Wrap},
};

use crate::engine::FilterControl;
use crate::predicate::{ColumnDomain, WidgetValue};
use crate::summary::format_number;

/// Short text for a control's current value.
pub fn value_summary(value: &WidgetValue) -> String {
    match value {
        WidgetValue::Selection(values) if values.is_empty() => "All".to_string(),
        WidgetValue::Selection(values) => values.join(", "),
        WidgetValue::NumberRange(low, high) => {
            let bound = |v: &Option<f64>| v.map(format_number).unwrap_or_else(|| "?".to_string());
            format!("{} .. {}", bound(low), bound(high))
        }
        WidgetValue::DateRange(start, end) => {
            let bound = |d: &Option<chrono::NaiveDate>| {
                d.map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "?".to_string())
            };
            format!("{} .. {}", bound(start), bound(end))
        }
    }
}

/// The filter sidebar: one entry per control, the focused multi-select
/// expanded into its options while it is being edited.
pub struct FilterSidebar<'a> {
    pub controls: &'a [FilterControl],
    pub focused: usize,
    /// Highlighted option of the focused multi-select, when open.
    pub option_cursor: Option<usize>,
    pub description: Option<&'a str>,
    pub border: Color,
    pub active: Color,
    pub dimmed: Color,
}

impl<'a> FilterSidebar<'a> {
    pub fn new(controls: &'a [FilterControl], focused: usize) -> Self {
        Self {
            controls,
            focused,
            option_cursor: None,
            description: None,
            border: Color::Cyan,
            active: Color::Yellow,
            dimmed: Color::DarkGray,
        }
    }

    pub fn with_option_cursor(mut self, cursor: Option<usize>) -> Self {
        self.option_cursor = cursor;
        self
    }

    pub fn with_description(mut self, description: Option<&'a str>) -> Self {
        self.description = description;
        self
    }

    pub fn with_colors(mut self, border: Color, active: Color, dimmed: Color) -> Self {
        self.border = border;
        self.active = active;
        self.dimmed = dimmed;
        self
    }

    /// Sidebar lines and the index of the line that must stay visible.
    fn lines(&self) -> (Vec<Line<'a>>, usize) {
        let mut lines = Vec::new();
        let mut anchor = 0;
        for (i, control) in self.controls.iter().enumerate() {
            let focused = i == self.focused;
            if focused {
                anchor = lines.len();
            }
            let marker = if focused { "▸ " } else { "  " };
            let mut name_style = Style::default().add_modifier(Modifier::BOLD);
            if control.active {
                name_style = name_style.fg(self.active);
            }
            if focused {
                name_style = name_style.add_modifier(Modifier::REVERSED);
            }
            lines.push(Line::from(vec![
                Span::raw(marker),
                Span::styled(control.column.as_str(), name_style),
            ]));

            let detail = match (&control.value, control.notice()) {
                (_, Some(notice)) => Span::styled(notice, Style::default().fg(self.dimmed)),
                (Some(value), None) => Span::raw(value_summary(value)),
                (None, None) => Span::styled("-", Style::default().fg(self.dimmed)),
            };
            lines.push(Line::from(vec![Span::raw("    "), detail]));

            if let (true, Some(cursor), ColumnDomain::Categories(options)) =
                (focused, self.option_cursor, &control.domain)
            {
                let selected: &[String] = match &control.value {
                    Some(WidgetValue::Selection(values)) => values,
                    _ => &[],
                };
                for (j, option) in options.iter().enumerate() {
                    let mark = if selected.contains(option) { "[x]" } else { "[ ]" };
                    let mut style = Style::default();
                    if j == cursor {
                        anchor = lines.len();
                        style = style.add_modifier(Modifier::REVERSED);
                    }
                    lines.push(Line::styled(format!("    {mark} {option}"), style));
                }
            }
        }
        (lines, anchor)
    }
}

impl Widget for &FilterSidebar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::bordered()
            .title("Filters")
            .border_style(Style::default().fg(self.border));
        let inner = block.inner(area);
        block.render(area, buf);

        let (list_area, description_area) = match self.description {
            Some(_) if inner.height > 8 => {
                let parts = Layout::new(
                    Direction::Vertical,
                    [Constraint::Fill(1), Constraint::Length(4)],
                )
                .split(inner);
                (parts[0], Some(parts[1]))
            }
            _ => (inner, None),
        };

        let (lines, anchor) = self.lines();
        let visible = list_area.height.saturating_sub(1) as usize;
        let offset = anchor.saturating_sub(visible);
        Paragraph::new(lines)
            .scroll((offset.min(u16::MAX as usize) as u16, 0))
            .render(list_area, buf);

        if let (Some(description), Some(area)) = (self.description, description_area) {
            Paragraph::new(description)
                .style(Style::default().fg(self.dimmed))
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(ratatui::widgets::Borders::TOP))
                .render(area, buf);
        }
    }
}
