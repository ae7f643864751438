use polars::prelude::*;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Cell, Row, StatefulWidget, Table, TableState},
};
use std::borrow::Cow;

/// Scroll position over the preview rows of a view.
#[derive(Debug, Default)]
pub struct DataTableState {
    pub offset: usize,
    pub table_state: TableState,
}

impl DataTableState {
    pub fn scroll_down(&mut self, rows: usize, available: usize) {
        self.offset = (self.offset + rows).min(available.saturating_sub(1));
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.offset = self.offset.saturating_sub(rows);
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

/// Renders the first `limit` rows of a frame, scrolled by the state offset.
pub struct DataTable<'a> {
    pub frame: &'a DataFrame,
    pub limit: usize,
    pub header_bg: Color,
    pub header_fg: Color,
    pub table_cell_padding: u16,
    pub alternate_row_bg: Option<Color>,
}

impl<'a> DataTable<'a> {
    pub fn new(frame: &'a DataFrame, limit: usize) -> Self {
        Self {
            frame,
            limit,
            header_bg: Color::Indexed(236),
            header_fg: Color::White,
            table_cell_padding: 1,
            alternate_row_bg: None,
        }
    }

    pub fn with_colors(mut self, header_bg: Color, header_fg: Color) -> Self {
        self.header_bg = header_bg;
        self.header_fg = header_fg;
        self
    }

    pub fn with_alternate_row_bg(mut self, color: Option<Color>) -> Self {
        self.alternate_row_bg = color;
        self
    }

    /// Rows reachable by scrolling.
    pub fn available_rows(&self) -> usize {
        self.frame.height().min(self.limit)
    }
}

impl StatefulWidget for DataTable<'_> {
    type State = DataTableState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let available = self.available_rows();
        state.offset = state.offset.min(available.saturating_sub(1));
        let visible = (area.height.saturating_sub(1) as usize).min(available - state.offset.min(available));
        let df = self.frame.slice(state.offset as i64, visible);
        let (height, cols) = df.shape();

        // widths start at the length of each column name
        let mut widths: Vec<u16> = df
            .get_column_names()
            .iter()
            .map(|name| name.chars().count() as u16)
            .collect();
        let mut used_width = 0;
        let mut rows: Vec<Vec<Cell>> = vec![vec![]; height];
        let mut visible_columns = 0;

        for col_index in 0..cols {
            let mut max_len = widths[col_index];
            let col_data = &df[col_index];

            for (row_index, row) in rows.iter_mut().enumerate() {
                let val_str: Cow<str> = match col_data.get(row_index) {
                    Ok(AnyValue::Null) | Err(_) => Cow::Borrowed(""),
                    Ok(value) => Cow::Owned(value.str_value().into_owned()),
                };
                max_len = max_len.max(val_str.chars().count() as u16);
                row.push(Cell::from(Line::from(val_str)));
            }

            let overflows = (used_width + max_len) > area.width;
            if overflows && col_data.dtype() == &DataType::String {
                visible_columns += 1;
                widths[col_index] = area.width.saturating_sub(used_width);
                break;
            } else if !overflows {
                visible_columns += 1;
                widths[col_index] = max_len;
                used_width += max_len + self.table_cell_padding;
            } else {
                break;
            }
        }

        widths.truncate(visible_columns);
        let rows: Vec<Row> = rows
            .into_iter()
            .enumerate()
            .map(|(row_index, mut row)| {
                row.truncate(visible_columns);
                let row_style = if row_index % 2 == 1 {
                    self.alternate_row_bg
                        .map(|c| Style::default().bg(c))
                        .unwrap_or_default()
                } else {
                    Style::default()
                };
                Row::new(row).style(row_style)
            })
            .collect();

        let header_row_style = if self.header_bg == Color::Reset {
            Style::default().fg(self.header_fg)
        } else {
            Style::default().bg(self.header_bg).fg(self.header_fg)
        };
        let headers: Vec<Span> = df
            .get_column_names()
            .iter()
            .take(visible_columns)
            .map(|name| Span::raw(name.to_string()))
            .collect();

        StatefulWidget::render(
            Table::new(rows, widths)
                .column_spacing(self.table_cell_padding)
                .header(Row::new(headers).style(header_row_style))
                .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
            area,
            buf,
            &mut state.table_state,
        );
    }
}
