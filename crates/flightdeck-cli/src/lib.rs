//! Shared CLI definitions for flightdeck.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, ValueEnum};

/// Dashboard page to open first (or to run headless with `--export`/`--charts`).
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum StartPage {
    /// Customer Explorer: customer profiles, enrollment and value filters
    #[default]
    Customers,
    /// Flights Explorer: monthly flight activity per customer
    Flights,
    /// Insights & Graphs: histograms, boxplots, locations and monthly trend
    Insights,
}

impl StartPage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Flights => "flights",
            Self::Insights => "insights",
        }
    }
}

/// Command-line arguments for flightdeck
#[derive(Clone, Parser, Debug)]
#[command(
    name = "flightdeck",
    version,
    about = "Loyalty program data exploration in the terminal"
)]
pub struct Args {
    /// Directory holding the flights, customers and metadata CSV files
    /// (defaults to config [data] directory, then ./data)
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: Option<std::path::PathBuf>,

    /// Page to open on start
    #[arg(long = "page", value_enum)]
    pub page: Option<StartPage>,

    /// Filter to apply before the first render, as COLUMN=SPEC.
    /// SPEC is LOW..HIGH for numeric and date columns, or a comma separated list of values
    /// for categorical columns. Repeatable. Example: --filter "Income=20000..90000"
    #[arg(long = "filter", value_name = "COLUMN=SPEC")]
    pub filters: Vec<String>,

    /// Write the filtered view of --page to this CSV file and exit (no terminal UI)
    #[arg(long = "export", value_name = "PATH")]
    pub export: Option<std::path::PathBuf>,

    /// Render the Insights charts of the filtered view into this directory and exit
    #[arg(long = "charts", value_name = "DIR")]
    pub charts: Option<std::path::PathBuf>,

    /// Number of histogram bins (overrides config [charts] bins)
    #[arg(long = "bins", value_name = "N")]
    pub bins: Option<usize>,

    /// Do not draw the linear trend line on the location scatter
    #[arg(long = "no-trend", action)]
    pub no_trend: bool,

    /// Number of rows kept in the table preview (overrides config [display] preview_rows)
    #[arg(long = "preview-rows", value_name = "N")]
    pub preview_rows: Option<usize>,

    /// Enable debug mode: debug-level logging and the in-app debug line
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Clear all cache data (log files) and exit
    #[arg(long = "clear-cache", action)]
    pub clear_cache: bool,

    /// Generate default configuration file at ~/.config/flightdeck/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

impl Args {
    /// True when the run should produce files and exit instead of starting the terminal UI.
    pub fn is_headless(&self) -> bool {
        self.export.is_some() || self.charts.is_some()
    }
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Render command-line options as markdown.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let placeholder: String = arg
            .get_value_names()
            .map(|names| {
                names
                    .iter()
                    .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let option_str = if arg.is_positional() {
            format!("[{placeholder}]")
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            if arg.get_action().takes_values() && !placeholder.is_empty() {
                format!("{op} {placeholder}")
            } else {
                op
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headless_args() {
        let args = Args::parse_from([
            "flightdeck",
            "data",
            "--page",
            "flights",
            "--filter",
            "DistanceKM=100..2000",
            "--filter",
            "Year=2021",
            "--export",
            "out.csv",
        ]);
        assert_eq!(args.page, Some(StartPage::Flights));
        assert_eq!(args.filters.len(), 2);
        assert!(args.is_headless());
        assert_eq!(args.data_dir.as_deref(), Some(std::path::Path::new("data")));
    }

    #[test]
    fn test_interactive_by_default() {
        let args = Args::parse_from(["flightdeck"]);
        assert!(!args.is_headless());
        assert!(args.filters.is_empty());
        assert_eq!(args.page, None);
    }

    #[test]
    fn test_force_requires_generate_config() {
        assert!(Args::try_parse_from(["flightdeck", "--force"]).is_err());
    }

    #[test]
    fn test_options_markdown_lists_filter() {
        let md = render_options_markdown();
        assert!(md.contains("--filter"));
        assert!(md.contains("--clear-cache"));
    }
}
