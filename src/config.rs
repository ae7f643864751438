use color_eyre::eyre::eyre;
use color_eyre::Result;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use supports_color::Stream;

/// Config format version accepted by [`AppConfig::validate`].
pub const CONFIG_VERSION: &str = "0.1";

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file or subdirectory
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Default configuration template as a string
    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write the default template to `config.toml`, refusing to clobber an existing file unless `force`.
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: String,
    pub data: DataConfig,
    pub display: DisplayConfig,
    pub charts: ChartsConfig,
    pub export: ExportConfig,
    pub theme: ThemeConfig,
    pub debug: DebugConfig,
}

/// Where the tables live and how their columns are typed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    pub directory: Option<PathBuf>,
    pub flights_file: String,
    pub customers_file: String,
    pub metadata_file: String,
    pub identifier: String,
    pub date_formats: Vec<String>,
    pub flights_dates: Vec<String>,
    pub customers_dates: Vec<String>,
    pub flights_continuous: Vec<String>,
    pub customers_continuous: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub preview_rows: usize,
    pub event_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    pub bins: usize,
    pub boxplot_rows: usize,
    pub show_trend: bool,
    pub kde: bool,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub colors: ColorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub primary: String,
    pub secondary: String,
    pub success: String,
    pub error: String,
    pub warning: String,
    pub dimmed: String,
    pub controls_bg: String,
    pub text_primary: String,
    pub text_secondary: String,
    pub table_header: String,
    pub table_border: String,
    pub alternate_row: String,
    pub sidebar_border: String,
    pub sidebar_active: String,
    pub chart_series: String,
    pub chart_trend: String,
    pub outlier_marker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_level: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            data: DataConfig::default(),
            display: DisplayConfig::default(),
            charts: ChartsConfig::default(),
            export: ExportConfig::default(),
            theme: ThemeConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            directory: None,
            flights_file: "DM_AIAI_FlightsDB.csv".to_string(),
            customers_file: "DM_AIAI_CustomerDB.csv".to_string(),
            metadata_file: "DM_AIAI_Metadata.csv".to_string(),
            identifier: "Loyalty#".to_string(),
            date_formats: strings(&["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d"]),
            flights_dates: strings(&["YearMonthDate"]),
            customers_dates: strings(&["EnrollmentDateOpening", "CancelledDate"]),
            flights_continuous: strings(&[
                "DistanceKM",
                "PointsAccumulated",
                "PointsRedeemed",
                "DollarCostPointsRedeemed",
            ]),
            customers_continuous: strings(&[
                "Latitude",
                "Longitude",
                "Income",
                "Customer Lifetime Value",
            ]),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            preview_rows: 500,
            event_poll_interval_ms: 25,
        }
    }
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            bins: 10,
            boxplot_rows: 2,
            show_trend: true,
            kde: true,
            width: 1600,
            height: 900,
        }
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            colors: ColorConfig::default(),
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            primary: "cyan".to_string(),
            secondary: "yellow".to_string(),
            success: "green".to_string(),
            error: "red".to_string(),
            warning: "yellow".to_string(),
            dimmed: "dark_gray".to_string(),
            controls_bg: "indexed(236)".to_string(),
            text_primary: "white".to_string(),
            text_secondary: "dark_gray".to_string(),
            table_header: "white".to_string(),
            table_border: "cyan".to_string(),
            alternate_row: "indexed(234)".to_string(),
            sidebar_border: "cyan".to_string(),
            sidebar_active: "yellow".to_string(),
            chart_series: "#0062ff".to_string(),
            chart_trend: "red".to_string(),
            outlier_marker: "red".to_string(),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_level: "info".to_string(),
        }
    }
}

/// Copy every listed field from `$other` into `$self` when it differs from the section default.
macro_rules! merge_changed {
    ($self:ident, $other:ident, $default:ident: $($field:ident),+ $(,)?) => {
        $(
            if $other.$field != $default.$field {
                $self.$field = $other.$field;
            }
        )+
    };
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let manager = ConfigManager::new(app_name)?;
        Self::load_from(&manager)
    }

    /// Load defaults merged with `config.toml` from the manager's directory, if present.
    pub fn load_from(manager: &ConfigManager) -> Result<Self> {
        let mut config = AppConfig::default();
        let config_path = manager.config_path("config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|e| {
                eyre!(
                    "Failed to read config file at {}: {}",
                    config_path.display(),
                    e
                )
            })?;
            let user: AppConfig = toml::from_str(&content).map_err(|e| {
                eyre!(
                    "Failed to parse config file at {}: {}",
                    config_path.display(),
                    e
                )
            })?;
            config.merge(user);
        }

        config.validate()?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != CONFIG_VERSION {
            self.version = other.version;
        }
        self.data.merge(other.data);
        self.display.merge(other.display);
        self.charts.merge(other.charts);
        self.export.merge(other.export);
        self.theme.merge(other.theme);
        self.debug.merge(other.debug);
    }

    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with(CONFIG_VERSION) {
            return Err(eyre!(
                "Unsupported config version: {}. Expected {}.x",
                self.version,
                CONFIG_VERSION
            ));
        }

        if self.display.event_poll_interval_ms == 0 {
            return Err(eyre!("event_poll_interval_ms must be greater than 0"));
        }
        if self.charts.bins == 0 {
            return Err(eyre!("charts.bins must be greater than 0"));
        }
        if self.charts.boxplot_rows == 0 {
            return Err(eyre!("charts.boxplot_rows must be greater than 0"));
        }
        if self.charts.width == 0 || self.charts.height == 0 {
            return Err(eyre!("charts.width and charts.height must be greater than 0"));
        }
        if self.data.identifier.trim().is_empty() {
            return Err(eyre!("data.identifier must not be empty"));
        }

        let parser = ColorParser::new();
        for (name, value) in self.theme.colors.entries() {
            parser
                .parse(value)
                .map_err(|e| eyre!("Invalid color value for '{}': {}", name, e))?;
        }

        Ok(())
    }
}

impl DataConfig {
    pub fn merge(&mut self, other: Self) {
        if other.directory.is_some() {
            self.directory = other.directory;
        }
        let default = DataConfig::default();
        merge_changed!(self, other, default:
            flights_file,
            customers_file,
            metadata_file,
            identifier,
            date_formats,
            flights_dates,
            customers_dates,
            flights_continuous,
            customers_continuous,
        );
    }

    /// Directory the tables are read from: explicit argument, then config, then `./data`.
    pub fn resolve_directory(&self, cli_dir: Option<&Path>) -> PathBuf {
        cli_dir
            .map(Path::to_path_buf)
            .or_else(|| self.directory.clone())
            .unwrap_or_else(|| PathBuf::from("data"))
    }
}

impl DisplayConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DisplayConfig::default();
        merge_changed!(self, other, default: preview_rows, event_poll_interval_ms);
    }
}

impl ChartsConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ChartsConfig::default();
        merge_changed!(self, other, default: bins, boxplot_rows, show_trend, kde, width, height);
    }
}

impl ExportConfig {
    pub fn merge(&mut self, other: Self) {
        if other.directory.is_some() {
            self.directory = other.directory;
        }
    }

    pub fn resolve_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

impl ThemeConfig {
    pub fn merge(&mut self, other: Self) {
        self.colors.merge(other.colors);
    }
}

impl ColorConfig {
    /// All color settings as (name, value) pairs.
    pub fn entries(&self) -> [(&'static str, &str); 17] {
        [
            ("primary", self.primary.as_str()),
            ("secondary", self.secondary.as_str()),
            ("success", self.success.as_str()),
            ("error", self.error.as_str()),
            ("warning", self.warning.as_str()),
            ("dimmed", self.dimmed.as_str()),
            ("controls_bg", self.controls_bg.as_str()),
            ("text_primary", self.text_primary.as_str()),
            ("text_secondary", self.text_secondary.as_str()),
            ("table_header", self.table_header.as_str()),
            ("table_border", self.table_border.as_str()),
            ("alternate_row", self.alternate_row.as_str()),
            ("sidebar_border", self.sidebar_border.as_str()),
            ("sidebar_active", self.sidebar_active.as_str()),
            ("chart_series", self.chart_series.as_str()),
            ("chart_trend", self.chart_trend.as_str()),
            ("outlier_marker", self.outlier_marker.as_str()),
        ]
    }

    pub fn merge(&mut self, other: Self) {
        let default = ColorConfig::default();
        merge_changed!(self, other, default:
            primary,
            secondary,
            success,
            error,
            warning,
            dimmed,
            controls_bg,
            text_primary,
            text_secondary,
            table_header,
            table_border,
            alternate_row,
            sidebar_border,
            sidebar_active,
            chart_series,
            chart_trend,
            outlier_marker,
        );
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DebugConfig::default();
        merge_changed!(self, other, default: enabled, log_level);
    }
}

/// Color parser with terminal capability detection
pub struct ColorParser {
    supports_true_color: bool,
    supports_256: bool,
    no_color: bool,
}

impl ColorParser {
    pub fn new() -> Self {
        let no_color = std::env::var("NO_COLOR").is_ok();
        let support = supports_color::on(Stream::Stdout);

        Self {
            supports_true_color: support.as_ref().map(|s| s.has_16m).unwrap_or(false),
            supports_256: support.as_ref().map(|s| s.has_256).unwrap_or(false),
            no_color,
        }
    }

    /// Parse a color string (hex, `indexed(n)` or named) into a terminal color
    pub fn parse(&self, s: &str) -> Result<Color> {
        if self.no_color {
            return Ok(Color::Reset);
        }

        let trimmed = s.trim();
        let lower = trimmed.to_lowercase();

        if trimmed.starts_with('#') {
            let (r, g, b) = parse_hex(trimmed)?;
            return Ok(if self.supports_true_color {
                Color::Rgb(r, g, b)
            } else if self.supports_256 {
                Color::Indexed(rgb_to_256_color(r, g, b))
            } else {
                rgb_to_basic_ansi(r, g, b)
            });
        }

        if let Some(inner) = lower
            .strip_prefix("indexed(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let num = inner.trim().parse::<u8>().map_err(|_| {
                eyre!(
                    "Invalid indexed color: '{}'. Expected format: indexed(0-255)",
                    trimmed
                )
            })?;
            return Ok(Color::Indexed(num));
        }

        let named = lower.replace(' ', "_").replace("grey", "gray");
        match named.as_str() {
            "black" => Ok(Color::Black),
            "red" => Ok(Color::Red),
            "green" => Ok(Color::Green),
            "yellow" => Ok(Color::Yellow),
            "blue" => Ok(Color::Blue),
            "magenta" => Ok(Color::Magenta),
            "cyan" => Ok(Color::Cyan),
            "white" => Ok(Color::White),
            "bright_black" | "gray" | "dark_gray" => Ok(Color::Indexed(8)),
            "bright_red" => Ok(Color::Indexed(9)),
            "bright_green" => Ok(Color::Indexed(10)),
            "bright_yellow" => Ok(Color::Indexed(11)),
            "bright_blue" => Ok(Color::Indexed(12)),
            "bright_magenta" => Ok(Color::Indexed(13)),
            "bright_cyan" => Ok(Color::Indexed(14)),
            "bright_white" => Ok(Color::Indexed(15)),
            "light_gray" => Ok(Color::Indexed(7)),
            "reset" => Ok(Color::Reset),
            _ => Err(eyre!(
                "Unknown color name: '{}'. Supported: basic ANSI colors (red, blue, etc.), \
                 bright variants (bright_red, etc.), indexed(n) or hex colors (#ff0000)",
                trimmed
            )),
        }
    }
}

impl Default for ColorParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_hex(s: &str) -> Result<(u8, u8, u8)> {
    let digits = s
        .strip_prefix('#')
        .filter(|d| d.len() == 6 && d.is_ascii())
        .ok_or_else(|| eyre!("Invalid hex color format: '{}'. Expected format: #rrggbb", s))?;
    let component = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| eyre!("Invalid hex color: {}", s))
    };
    Ok((component(0..2)?, component(2..4)?, component(4..6)?))
}

/// Nearest xterm 256-color palette index.
pub fn rgb_to_256_color(r: u8, g: u8, b: u8) -> u8 {
    let spread = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if spread < 10 {
        let gray = (r as u16 + g as u16 + b as u16) / 3;
        return match gray {
            0..=7 => 16,
            248..=u16::MAX => 231,
            _ => 232 + ((gray - 8) * 24 / 240) as u8,
        };
    }
    let level = |c: u8| (c as u16 * 5 / 255) as u8;
    16 + 36 * level(r) + 6 * level(g) + level(b)
}

/// Nearest of the 8 basic ANSI colors.
pub fn rgb_to_basic_ansi(r: u8, g: u8, b: u8) -> Color {
    let spread = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if spread < 30 {
        let avg = (r as u16 + g as u16 + b as u16) / 3;
        return if avg < 64 { Color::Black } else { Color::White };
    }
    match (r > 128, g > 128, b > 128) {
        (false, false, false) => Color::Black,
        (true, false, false) => Color::Red,
        (false, true, false) => Color::Green,
        (true, true, false) => Color::Yellow,
        (false, false, true) => Color::Blue,
        (true, false, true) => Color::Magenta,
        (false, true, true) => Color::Cyan,
        (true, true, true) => Color::White,
    }
}

/// Parsed colors ready for rendering
#[derive(Debug, Clone, Default)]
pub struct Theme {
    pub colors: HashMap<String, Color>,
}

impl Theme {
    pub fn from_config(config: &ThemeConfig) -> Result<Self> {
        let parser = ColorParser::new();
        let colors = config
            .colors
            .entries()
            .into_iter()
            .map(|(name, value)| Ok((name.to_string(), parser.parse(value)?)))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { colors })
    }

    /// Color by name, `Reset` if unknown
    pub fn get(&self, name: &str) -> Color {
        self.colors.get(name).copied().unwrap_or(Color::Reset)
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");
