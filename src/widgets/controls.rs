use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    widgets::{Paragraph, Widget},
};

const BROWSE_CONTROLS: [(&str, &str); 9] = [
    ("Tab", "Page"),
    ("↑↓", "Filter"),
    ("Enter", "Edit"),
    ("d", "Reset"),
    ("C", "Clear All"),
    ("PgDn", "Scroll"),
    ("e", "Export"),
    ("g", "Charts"),
    ("q", "Quit"),
];

const EDIT_CONTROLS: [(&str, &str); 4] = [
    ("↑↓", "Option"),
    ("Space", "Toggle"),
    ("Enter", "Apply"),
    ("Esc", "Cancel"),
];

/// Key hints along the bottom of the screen, with the row count on the right.
#[derive(Default)]
pub struct Controls {
    /// Filtered rows and base rows.
    pub row_count: Option<(usize, usize)>,
    pub editing: bool,
    pub bg: Color,
    pub fg: Color,
}

impl Controls {
    pub fn with_row_count(rows: usize, base_rows: usize) -> Self {
        Self {
            row_count: Some((rows, base_rows)),
            bg: Color::DarkGray,
            fg: Color::White,
            ..Self::default()
        }
    }

    pub fn with_editing(mut self, editing: bool) -> Self {
        self.editing = editing;
        self
    }

    pub fn with_colors(mut self, bg: Color, fg: Color) -> Self {
        self.bg = bg;
        self.fg = fg;
        self
    }

    fn entries(&self) -> &'static [(&'static str, &'static str)] {
        if self.editing {
            &EDIT_CONTROLS
        } else {
            &BROWSE_CONTROLS
        }
    }
}

impl Widget for &Controls {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let entries = self.entries();
        let mut constraints = entries.iter().fold(vec![], |mut acc, (key, action)| {
            acc.push(Constraint::Length(key.chars().count() as u16 + 2));
            acc.push(Constraint::Length(action.chars().count() as u16 + 1));
            acc
        });

        let row_count_text = self
            .row_count
            .map(|(rows, base)| format!("Rows: {rows} / {base} "));
        if let Some(text) = &row_count_text {
            constraints.push(Constraint::Length(text.chars().count() as u16));
        }
        constraints.push(Constraint::Fill(1));

        let layout = Layout::new(Direction::Horizontal, constraints).split(area);
        let base_style = Style::default();

        for (i, (key, action)) in entries.iter().enumerate() {
            let j = i * 2;
            Paragraph::new(*key)
                .style(base_style.bold())
                .centered()
                .render(layout[j], buf);
            Paragraph::new(*action)
                .style(base_style.bg(self.bg))
                .render(layout[j + 1], buf);
        }

        let row_count_idx = entries.len() * 2;
        if let Some(text) = row_count_text {
            Paragraph::new(text)
                .style(base_style.bg(self.bg).fg(self.fg))
                .right_aligned()
                .render(layout[row_count_idx], buf);
        }
        Paragraph::new("")
            .style(base_style.bg(self.bg))
            .render(layout[layout.len() - 1], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(controls: &Controls, width: u16) -> String {
        let area = Rect::new(0, 0, width, 1);
        let mut buf = Buffer::empty(area);
        controls.render(area, &mut buf);
        (0..width).map(|x| buf[(x, 0)].symbol().to_string()).collect()
    }

    #[test]
    fn test_shows_row_count() {
        let text = rendered(&Controls::with_row_count(12, 340), 140);
        assert!(text.contains("Clear All"));
        assert!(text.contains("Rows: 12 / 340"));
    }

    #[test]
    fn test_edit_mode_hints() {
        let text = rendered(&Controls::with_row_count(1, 1).with_editing(true), 140);
        assert!(text.contains("Toggle"));
        assert!(!text.contains("Clear All"));
    }
}
