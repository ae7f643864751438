use flightdeck::config::{AppConfig, ConfigManager};
use std::fs;
use tempfile::TempDir;

// Helper to create a temporary config directory for testing
fn setup_test_config_dir() -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
    (temp_dir, config_manager)
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.version, "0.1");

    // Data defaults
    assert_eq!(config.data.identifier, "Loyalty#");
    assert_eq!(config.data.customers_file, "DM_AIAI_CustomerDB.csv");
    assert!(config
        .data
        .customers_dates
        .contains(&"EnrollmentDateOpening".to_string()));

    // Display and chart defaults
    assert_eq!(config.display.event_poll_interval_ms, 25);
    assert_eq!(config.charts.bins, 10);
    assert_eq!(config.charts.boxplot_rows, 2);
    assert!(config.charts.show_trend);

    assert!(config.export.directory.is_none());
    assert!(!config.debug.enabled);
    assert!(config.validate().is_ok());
}

#[test]
fn test_generate_default_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let template = config_manager.generate_default_config();

    assert!(template.contains("[data]"));
    assert!(template.contains("[display]"));
    assert!(template.contains("[charts]"));
    assert!(template.contains("[export]"));
    assert!(template.contains("[theme.colors]"));
    assert!(template.contains("[debug]"));

    // The template itself must parse and validate
    let parsed: AppConfig = toml::from_str(&template).expect("template parses");
    assert!(parsed.validate().is_ok());
}

#[test]
fn test_write_default_config_respects_force() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let path = config_manager.write_default_config(false).unwrap();
    assert!(path.exists());

    let err = config_manager.write_default_config(false).unwrap_err();
    assert!(err.to_string().contains("already exists"));

    fs::write(&path, "# edited").unwrap();
    config_manager.write_default_config(true).unwrap();
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("[charts]"));
}

#[test]
fn test_load_without_config_file_uses_defaults() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    let config = AppConfig::load_from(&config_manager).unwrap();
    assert_eq!(config.charts.bins, AppConfig::default().charts.bins);
}

#[test]
fn test_load_merges_partial_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    config_manager.ensure_config_dir().unwrap();
    fs::write(
        config_manager.config_path("config.toml"),
        r#"
version = "0.1"

[charts]
bins = 20
show_trend = false

[data]
directory = "/srv/loyalty"
"#,
    )
    .unwrap();

    let config = AppConfig::load_from(&config_manager).unwrap();
    assert_eq!(config.charts.bins, 20);
    assert!(!config.charts.show_trend);
    assert_eq!(config.charts.boxplot_rows, 2);
    assert_eq!(
        config.data.directory.as_deref(),
        Some(std::path::Path::new("/srv/loyalty"))
    );
    assert_eq!(config.data.identifier, "Loyalty#");
}

#[test]
fn test_load_reports_parse_errors() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    config_manager.ensure_config_dir().unwrap();
    fs::write(config_manager.config_path("config.toml"), "[charts\nbins = ").unwrap();

    let err = AppConfig::load_from(&config_manager).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_validate_rejects_invalid_values() {
    let mut config = AppConfig::default();
    config.charts.bins = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.data.identifier = "  ".to_string();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.version = "9.0".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_invalid_color() {
    // NO_COLOR maps every color to Reset
    if std::env::var("NO_COLOR").is_ok() {
        return;
    }
    let mut config = AppConfig::default();
    config.theme.colors.chart_series = "not-a-color".to_string();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("chart_series"));
}
