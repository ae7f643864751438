use color_eyre::eyre::eyre;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use tracing::{info, warn};

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Paragraph, StatefulWidget, Tabs, Wrap};
use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};

pub mod cache;
pub mod catalog;
pub mod chart_export;
pub mod charts;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod export;
pub mod predicate;
pub mod state;
pub mod summary;
pub mod widgets;

pub use cache::CacheManager;
pub use catalog::Catalog;
pub use config::{AppConfig, ConfigManager, Theme};
pub use dashboard::{Dashboard, FigureKind, PageView};
pub use flightdeck_cli::{Args, StartPage};
pub use state::Page;

use predicate::{ColumnDomain, WidgetKind, WidgetValue};
use widgets::controls::Controls;
use widgets::datatable::{DataTable, DataTableState};
use widgets::debug::DebugState;
use widgets::figure::FigureView;
use widgets::filters::FilterSidebar;
use widgets::metrics::MetricsBar;
use widgets::text_input::{TextInput, TextInputEvent};

/// Application name used for cache directory and other app-specific paths
pub const APP_NAME: &str = "flightdeck";

const SIDEBAR_WIDTH: u16 = 36;
const SCROLL_STEP: usize = 10;

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize(u16, u16),
    /// Recompute the current page from the filter state.
    Render,
    Exit,
    Crash(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Browse,
    /// Typing `low..high` for the focused range filter.
    EditRange,
    /// Moving through the options of the focused multi-select.
    SelectOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Status {
    text: String,
    error: bool,
}

pub struct App {
    events: Sender<AppEvent>,
    dashboard: Dashboard,
    page: Page,
    view: PageView,
    focus: usize,
    mode: InputMode,
    input: TextInput,
    option_cursor: usize,
    table_state: DataTableState,
    figure_index: usize,
    status: Option<Status>,
    preview_rows: usize,
    export_dir: PathBuf,
    chart_size: (u32, u32),
    theme: Theme,
    debug: DebugState,
}

impl App {
    pub fn new(
        events: Sender<AppEvent>,
        mut dashboard: Dashboard,
        page: Page,
        config: &AppConfig,
        theme: Theme,
    ) -> Self {
        let view = dashboard.render(page);
        let input = TextInput::new().with_text_color(theme.get("text_primary"));
        let mut debug = DebugState {
            enabled: config.debug.enabled,
            ..DebugState::default()
        };
        debug.num_render_passes = 1;
        Self {
            events,
            dashboard,
            page,
            view,
            focus: 0,
            mode: InputMode::Browse,
            input,
            option_cursor: 0,
            table_state: DataTableState::default(),
            figure_index: 0,
            status: None,
            preview_rows: config.display.preview_rows,
            export_dir: config.export.resolve_directory(),
            chart_size: (config.charts.width, config.charts.height),
            theme,
            debug,
        }
    }

    pub fn enable_debug(&mut self) {
        self.debug.enabled = true;
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn view(&self) -> &PageView {
        &self.view
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.text.as_str())
    }

    /// Column of the focused filter control.
    pub fn focused_column(&self) -> Option<&str> {
        self.view.controls.get(self.focus).map(|c| c.column.as_str())
    }

    fn color(&self, name: &str) -> Color {
        self.theme.get(name)
    }

    fn info(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            error: false,
        });
    }

    fn error(&mut self, text: impl Into<String>) {
        let text = text.into();
        warn!(message = %text, "action failed");
        self.status = Some(Status { text, error: true });
    }

    /// Ask the event loop for a render pass after the current event.
    fn request_render(&self) {
        if self.events.send(AppEvent::Render).is_err() {
            warn!("event channel closed");
        }
    }

    fn refresh(&mut self) {
        self.view = self.dashboard.render(self.page);
        self.debug.num_render_passes += 1;
        self.focus = self.focus.min(self.view.controls.len().saturating_sub(1));
        self.figure_index = self.figure_index.min(self.view.figures.len().saturating_sub(1));
    }

    fn set_page(&mut self, page: Page) -> Option<AppEvent> {
        if page == self.page {
            return None;
        }
        self.page = page;
        self.focus = 0;
        self.figure_index = 0;
        self.table_state.reset();
        self.status = None;
        self.debug.last_action = format!("page:{}", page.title());
        Some(AppEvent::Render)
    }

    fn key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        self.debug.on_key(event);
        match self.mode {
            InputMode::EditRange => self.edit_range_key(event),
            InputMode::SelectOptions => self.select_options_key(event),
            InputMode::Browse => self.browse_key(event),
        }
    }

    fn browse_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        match event.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(AppEvent::Exit),
            KeyCode::Tab => self.set_page(self.page.next()),
            KeyCode::BackTab => self.set_page(self.page.prev()),
            KeyCode::Char(c @ '1'..='3') => {
                let index = c as usize - '1' as usize;
                self.set_page(Page::ALL[index])
            }
            KeyCode::Up => {
                self.focus = self.focus.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                if self.focus + 1 < self.view.controls.len() {
                    self.focus += 1;
                }
                None
            }
            KeyCode::Enter => {
                self.start_editing();
                None
            }
            KeyCode::Char('d') => {
                let column = self.focused_column()?.to_string();
                self.debug.last_action = format!("reset:{column}");
                if self.dashboard.reset_column(self.page, &column) {
                    self.info(format!("Reset {column}"));
                    self.request_render();
                }
                None
            }
            KeyCode::Char('C') => {
                let cleared = self.dashboard.reset_page(self.page);
                self.debug.last_action = "clear_all".to_string();
                self.info(format!("Cleared {cleared} filter(s) on {}", self.page.title()));
                self.table_state.reset();
                self.request_render();
                None
            }
            KeyCode::PageDown => {
                let available = self.view.rows().min(self.preview_rows);
                self.table_state.scroll_down(SCROLL_STEP, available);
                None
            }
            KeyCode::PageUp => {
                self.table_state.scroll_up(SCROLL_STEP);
                None
            }
            KeyCode::Right if !self.view.figures.is_empty() => {
                self.figure_index = (self.figure_index + 1) % self.view.figures.len();
                None
            }
            KeyCode::Left if !self.view.figures.is_empty() => {
                let n = self.view.figures.len();
                self.figure_index = (self.figure_index + n - 1) % n;
                None
            }
            KeyCode::Char('e') => {
                self.export_csv();
                None
            }
            KeyCode::Char('g') => {
                self.export_charts();
                None
            }
            _ => None,
        }
    }

    fn start_editing(&mut self) {
        let Some(control) = self.view.controls.get(self.focus) else {
            return;
        };
        match control.kind() {
            Some(WidgetKind::MultiSelect) => {
                self.mode = InputMode::SelectOptions;
                self.option_cursor = 0;
            }
            Some(WidgetKind::NumberRange | WidgetKind::DateRange) => {
                let text = control
                    .value
                    .as_ref()
                    .map(WidgetValue::to_input_text)
                    .unwrap_or_default();
                let title = format!("{} (low..high)", control.column);
                self.input.set_block(Block::bordered().title(title));
                self.input.set_value(text);
                self.input.set_focused(true);
                self.mode = InputMode::EditRange;
            }
            None => {
                let notice = control
                    .notice()
                    .unwrap_or_else(|| "not filterable".to_string());
                let message = format!("{}: {notice}", control.column);
                self.info(message);
            }
        }
    }

    fn stop_editing(&mut self) {
        self.mode = InputMode::Browse;
        self.input.set_focused(false);
    }

    fn edit_range_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        match self.input.handle_key(event) {
            TextInputEvent::Submit => {
                self.stop_editing();
                let control = self.view.controls.get(self.focus)?;
                let kind = control.kind()?;
                let column = control.column.clone();
                let value = WidgetValue::parse(kind, self.input.value());
                self.debug.last_action = format!("set:{column}");
                self.dashboard.set_filter(self.page, &column, value);
                self.request_render();
                None
            }
            TextInputEvent::Cancel => {
                self.stop_editing();
                None
            }
            TextInputEvent::None => None,
        }
    }

    fn select_options_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        let control = self.view.controls.get(self.focus)?;
        let ColumnDomain::Categories(options) = &control.domain else {
            self.stop_editing();
            return None;
        };
        match event.code {
            KeyCode::Up => {
                self.option_cursor = self.option_cursor.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                if self.option_cursor + 1 < options.len() {
                    self.option_cursor += 1;
                }
                None
            }
            KeyCode::Char(' ') => {
                let option = options.get(self.option_cursor)?.clone();
                let mut selected = match &control.value {
                    Some(WidgetValue::Selection(values)) => values.clone(),
                    _ => Vec::new(),
                };
                if let Some(pos) = selected.iter().position(|v| *v == option) {
                    selected.remove(pos);
                } else {
                    selected.push(option);
                }
                let column = control.column.clone();
                self.debug.last_action = format!("toggle:{column}");
                self.dashboard
                    .set_filter(self.page, &column, WidgetValue::Selection(selected));
                self.request_render();
                None
            }
            KeyCode::Enter | KeyCode::Esc => {
                self.stop_editing();
                None
            }
            _ => None,
        }
    }

    fn export_csv(&mut self) {
        let Some(filtered) = self.view.filtered.as_ref() else {
            self.error("Nothing to export");
            return;
        };
        let stem = export::export_stem(self.page, chrono::Local::now());
        let path = self.export_dir.join(format!("{stem}.csv"));
        match export::write_csv(&filtered.frame, &path) {
            Ok(rows) => self.info(format!("Exported {rows} rows to {}", path.display())),
            Err(e) => self.error(format!("Export failed: {e}")),
        }
    }

    fn export_charts(&mut self) {
        if self.page != Page::Insights {
            self.info(format!("Charts are on the {} page", Page::Insights.title()));
            return;
        }
        let stem = export::export_stem(self.page, chrono::Local::now());
        match write_figures(&self.view, &self.export_dir, &stem, self.chart_size) {
            Ok((written, _)) if written.is_empty() => self.error("No charts to export"),
            Ok((written, _)) => self.info(format!(
                "Wrote {} chart(s) to {}",
                written.len(),
                self.export_dir.display()
            )),
            Err(e) => self.error(format!("Chart export failed: {e}")),
        }
    }

    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        self.debug.num_events += 1;
        match event {
            AppEvent::Key(key) if key.kind == KeyEventKind::Press => self.key(key),
            AppEvent::Render => {
                self.refresh();
                None
            }
            _ => None,
        }
    }
}

/// Write every available figure of `view` as PNG into `dir`.
/// Returns written paths and figures that could not be drawn.
pub fn write_figures(
    view: &PageView,
    dir: &Path,
    stem: &str,
    size: (u32, u32),
) -> Result<(Vec<PathBuf>, Vec<String>)> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    let mut skipped = Vec::new();
    for (kind, figure) in &view.figures {
        match figure {
            Ok(figure) => {
                let path = dir.join(format!("{stem}-{}.png", kind.file_stem()));
                chart_export::write_figure(&path, figure, size)?;
                info!(figure = kind.title(), path = %path.display(), "exported chart");
                written.push(path);
            }
            Err(e) => skipped.push(format!("{}: {e}", kind.title())),
        }
    }
    Ok((written, skipped))
}

/// Fold command-line overrides into the loaded configuration.
pub fn apply_args(config: &mut AppConfig, args: &Args) {
    if let Some(dir) = &args.data_dir {
        config.data.directory = Some(dir.clone());
    }
    if let Some(bins) = args.bins {
        config.charts.bins = bins;
    }
    if args.no_trend {
        config.charts.show_trend = false;
    }
    if let Some(rows) = args.preview_rows {
        config.display.preview_rows = rows;
    }
    if args.debug {
        config.debug.enabled = true;
        config.debug.log_level = "debug".to_string();
    }
}

/// Page a run starts on; `--charts` alone starts on the Insights page.
pub fn start_page(args: &Args) -> Page {
    match args.page {
        Some(page) => page.into(),
        None if args.charts.is_some() => Page::Insights,
        None => Page::CustomerExplorer,
    }
}

/// One render pass without the terminal UI: print metrics, write the requested files.
pub fn run_headless(args: &Args, dashboard: &mut Dashboard, config: &AppConfig) -> Result<()> {
    let page = start_page(args);
    dashboard.apply_filter_args(page, &args.filters)?;
    let view = dashboard.render(page);

    println!("{}: {} of {} rows", page.title(), view.rows(), view.base_rows);
    if let Some(metrics) = &view.metrics {
        for metric in &metrics.values {
            println!("  {}: {}", metric.label, metric.value);
        }
    }
    for notice in &view.notices {
        eprintln!("note: {notice}");
    }

    if let Some(path) = &args.export {
        let filtered = view
            .filtered
            .as_ref()
            .ok_or_else(|| eyre!("Nothing to export for {}", page.title()))?;
        let rows = export::write_csv(&filtered.frame, path)?;
        println!("Exported {rows} rows to {}", path.display());
    }

    if let Some(dir) = &args.charts {
        let insights = if page == Page::Insights {
            view
        } else {
            dashboard.render(Page::Insights)
        };
        let size = (config.charts.width, config.charts.height);
        let (written, skipped) = write_figures(&insights, dir, "insights", size)?;
        for path in &written {
            println!("Wrote {}", path.display());
        }
        for reason in &skipped {
            eprintln!("skipped {reason}");
        }
        if written.is_empty() && insights.is_empty() {
            eprintln!("No charts written: no records match the current filters");
        }
    }
    Ok(())
}

impl App {
    fn render_tabs(&self, area: Rect, buf: &mut Buffer) {
        Tabs::new(Page::ALL.iter().map(|p| p.title()))
            .select(self.page.index())
            .style(Style::default().fg(self.color("text_secondary")))
            .highlight_style(
                Style::default()
                    .fg(self.color("primary"))
                    .add_modifier(Modifier::BOLD),
            )
            .render(area, buf);
    }

    fn render_sidebar(&self, area: Rect, buf: &mut Buffer) {
        let (list_area, input_area) = if self.mode == InputMode::EditRange {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Fill(1), Constraint::Length(3)])
                .split(area);
            (parts[0], Some(parts[1]))
        } else {
            (area, None)
        };

        let description = self
            .focused_column()
            .and_then(|column| self.dashboard.describe(column));
        let option_cursor = (self.mode == InputMode::SelectOptions).then_some(self.option_cursor);
        let sidebar = FilterSidebar::new(&self.view.controls, self.focus)
            .with_option_cursor(option_cursor)
            .with_description(description.as_deref())
            .with_colors(
                self.color("sidebar_border"),
                self.color("sidebar_active"),
                self.color("dimmed"),
            );
        sidebar.render(list_area, buf);

        if let Some(input_area) = input_area {
            self.input.render(input_area, buf);
        }
    }

    fn render_main(&mut self, area: Rect, buf: &mut Buffer) {
        let Some(filtered) = self.view.filtered.as_ref() else {
            Paragraph::new("The current filters could not be applied")
                .style(Style::default().fg(self.color("error")))
                .centered()
                .render(area, buf);
            return;
        };
        if filtered.is_empty() {
            Paragraph::new("No records match the current filters. Press C to clear all filters.")
                .style(Style::default().fg(self.color("warning")))
                .centered()
                .block(Block::bordered().border_style(Style::default().fg(self.color("table_border"))))
                .render(area, buf);
            return;
        }

        if self.page == Page::Insights {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(1), Constraint::Fill(1)])
                .split(area);
            Tabs::new(self.view.figures.iter().map(|(kind, _)| kind.title()))
                .select(self.figure_index)
                .highlight_style(
                    Style::default()
                        .fg(self.color("secondary"))
                        .add_modifier(Modifier::BOLD),
                )
                .render(parts[0], buf);
            match self.view.figures.get(self.figure_index) {
                Some((_, Ok(figure))) => {
                    let view = FigureView::new(figure).with_colors(
                        self.color("chart_series"),
                        self.color("chart_trend"),
                        self.color("outlier_marker"),
                        self.color("text_primary"),
                    );
                    (&view).render(parts[1], buf);
                }
                Some((kind, Err(e))) => {
                    Paragraph::new(format!("{}: {e}", kind.title()))
                        .style(Style::default().fg(self.color("error")))
                        .wrap(Wrap { trim: true })
                        .block(Block::bordered())
                        .render(parts[1], buf);
                }
                None => {}
            }
            return;
        }

        let block = Block::bordered()
            .title(format!("{} rows", filtered.height()))
            .border_style(Style::default().fg(self.color("table_border")));
        let inner = block.inner(area);
        block.render(area, buf);
        DataTable::new(&filtered.frame, self.preview_rows)
            .with_colors(self.color("controls_bg"), self.color("table_header"))
            .with_alternate_row_bg(Some(self.color("alternate_row")))
            .render(inner, buf, &mut self.table_state);
    }

    fn render_status(&self, area: Rect, buf: &mut Buffer) {
        let (text, color) = match &self.status {
            Some(Status { text, error: true }) => (text.clone(), self.color("error")),
            Some(Status { text, error: false }) => (text.clone(), self.color("success")),
            None => (self.view.notices.join(" | "), self.color("warning")),
        };
        Paragraph::new(text)
            .style(Style::default().fg(color))
            .render(area, buf);
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.debug.num_frames += 1;

        let mut constraints = vec![
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ];
        if self.debug.enabled {
            constraints.push(Constraint::Length(1));
        }
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        self.render_tabs(layout[0], buf);
        let metrics = MetricsBar::new(self.view.metrics.as_ref()).with_colors(
            self.color("primary"),
            self.color("text_primary"),
            self.color("dimmed"),
        );
        (&metrics).render(layout[1], buf);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Fill(1)])
            .split(layout[2]);
        self.render_sidebar(body[0], buf);
        self.render_main(body[1], buf);
        self.render_status(layout[3], buf);

        let controls = Controls::with_row_count(self.view.rows(), self.view.base_rows)
            .with_editing(self.mode != InputMode::Browse)
            .with_colors(self.color("controls_bg"), self.color("text_primary"));
        (&controls).render(layout[4], buf);

        if self.debug.enabled {
            (&self.debug).render(layout[5], buf);
        }
    }
}
