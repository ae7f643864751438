//! Loads the flights, customers and metadata tables once and classifies
//! their columns.

use chrono::{Datelike, NaiveDate};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

use crate::config::DataConfig;

/// Days between 0001-01-01 (CE day 1) and 1970-01-01.
const UNIX_EPOCH_CE_DAYS: i32 = 719_163;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    Flights,
    Customers,
}

impl TableKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Flights => "flights",
            Self::Customers => "customers",
        }
    }
}

/// Static classification of a column, computed once at load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnRole {
    Identifier,
    NumericContinuous,
    NumericDiscrete,
    Categorical,
    Date,
    Unclassified,
}

impl ColumnRole {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::NumericContinuous | Self::NumericDiscrete)
    }

    /// Numeric and date columns are filtered by a (low, high) range.
    pub fn is_range(self) -> bool {
        self.is_numeric() || self == Self::Date
    }
}

fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn classify(name: &str, dtype: &DataType, identifier: &str, continuous: &[String]) -> ColumnRole {
    if name == identifier {
        ColumnRole::Identifier
    } else if matches!(dtype, DataType::Date | DataType::Datetime(..)) {
        ColumnRole::Date
    } else if is_numeric_type(dtype) {
        if continuous.iter().any(|c| c == name) {
            ColumnRole::NumericContinuous
        } else {
            ColumnRole::NumericDiscrete
        }
    } else if matches!(dtype, DataType::String | DataType::Boolean) {
        ColumnRole::Categorical
    } else {
        ColumnRole::Unclassified
    }
}

/// An immutable base table with its column roles.
#[derive(Debug, Clone)]
pub struct Table {
    kind: TableKind,
    frame: DataFrame,
    roles: Vec<(String, ColumnRole)>,
}

impl Table {
    pub fn new(kind: TableKind, frame: DataFrame, identifier: &str, continuous: &[String]) -> Self {
        let roles = frame
            .get_columns()
            .iter()
            .map(|c| {
                let name = c.name().to_string();
                let role = classify(&name, c.dtype(), identifier, continuous);
                (name, role)
            })
            .collect();
        Self { kind, frame, roles }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.roles.iter().any(|(name, _)| name == column)
    }

    pub fn role(&self, column: &str) -> Option<ColumnRole> {
        self.roles
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, role)| *role)
    }

    fn columns_where(&self, keep: impl Fn(ColumnRole) -> bool) -> Vec<String> {
        self.roles
            .iter()
            .filter(|(_, role)| keep(*role))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Continuous and discrete numeric columns (the metric features).
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns_where(ColumnRole::is_numeric)
    }

    pub fn continuous_columns(&self) -> Vec<String> {
        self.columns_where(|r| r == ColumnRole::NumericContinuous)
    }

    pub fn categorical_columns(&self) -> Vec<String> {
        self.columns_where(|r| r == ColumnRole::Categorical)
    }

    pub fn date_columns(&self) -> Vec<String> {
        self.columns_where(|r| r == ColumnRole::Date)
    }
}

/// The three tables, loaded once and shared read-only by every page.
#[derive(Debug, Clone)]
pub struct Catalog {
    flights: Table,
    customers: Table,
    metadata: DataFrame,
}

impl Catalog {
    /// Read all three files from the configured data directory.
    pub fn load(config: &DataConfig) -> Result<Self> {
        let dir = config.resolve_directory(None);
        let flights = read_csv(&dir.join(&config.flights_file), b',', true)?;
        let customers = read_csv(&dir.join(&config.customers_file), b',', true)?;
        let metadata = read_metadata(&dir.join(&config.metadata_file))?;
        let catalog = Self::from_frames(flights, customers, metadata, config)?;
        info!(
            flights = catalog.flights.height(),
            customers = catalog.customers.height(),
            dir = %dir.display(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    /// Normalise dates and classify columns of already-read frames.
    pub fn from_frames(
        mut flights: DataFrame,
        mut customers: DataFrame,
        metadata: DataFrame,
        config: &DataConfig,
    ) -> Result<Self> {
        normalize_dates(&mut flights, &config.flights_dates, &config.date_formats)?;
        normalize_dates(&mut customers, &config.customers_dates, &config.date_formats)?;
        let flights = Table::new(
            TableKind::Flights,
            flights,
            &config.identifier,
            &config.flights_continuous,
        );
        let customers = Table::new(
            TableKind::Customers,
            customers,
            &config.identifier,
            &config.customers_continuous,
        );
        debug!(roles = ?customers.roles, "customer column roles");
        debug!(roles = ?flights.roles, "flight column roles");
        Ok(Self {
            flights,
            customers,
            metadata,
        })
    }

    pub fn flights(&self) -> &Table {
        &self.flights
    }

    pub fn customers(&self) -> &Table {
        &self.customers
    }

    pub fn metadata(&self) -> &DataFrame {
        &self.metadata
    }

    pub fn table(&self, kind: TableKind) -> &Table {
        match kind {
            TableKind::Flights => &self.flights,
            TableKind::Customers => &self.customers,
        }
    }

    /// Description of a variable from the metadata table (first column name, second description).
    pub fn describe(&self, column: &str) -> Option<String> {
        let columns = self.metadata.get_columns();
        if columns.len() < 2 {
            return None;
        }
        let names = columns[0].as_materialized_series().cast(&DataType::String).ok()?;
        let descriptions = columns[1].as_materialized_series().cast(&DataType::String).ok()?;
        let names = names.str().ok()?;
        let descriptions = descriptions.str().ok()?;
        let description = names
            .iter()
            .zip(descriptions.iter())
            .find(|(name, _)| name.map(str::trim) == Some(column))
            .and_then(|(_, desc)| desc.map(|d| d.trim().to_string()))
            .filter(|d| !d.is_empty());
        description
    }
}

fn read_csv(path: &Path, separator: u8, has_header: bool) -> Result<DataFrame> {
    if !path.exists() {
        return Err(eyre!("Data file not found: {}", path.display()));
    }
    let mut read_options = CsvReadOptions::default();
    read_options.has_header = has_header;
    read_options = read_options.map_parse_options(|opts| {
        opts.with_separator(separator).with_try_parse_dates(true)
    });
    read_options
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .wrap_err_with(|| format!("Failed to read {}", path.display()))
}

/// Semicolon separated, headerless, every field kept as text.
fn read_metadata(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(eyre!("Metadata file not found: {}", path.display()));
    }
    let mut read_options = CsvReadOptions::default();
    read_options.has_header = false;
    read_options.infer_schema_length = Some(0);
    read_options = read_options.map_parse_options(|opts| {
        opts.with_separator(b';')
            .with_encoding(CsvEncoding::LossyUtf8)
            .with_truncate_ragged_lines(true)
    });
    read_options
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .wrap_err_with(|| format!("Failed to read {}", path.display()))
}

/// Convert the listed columns to `Date`. Values that cannot be parsed become null.
pub fn normalize_dates(
    df: &mut DataFrame,
    columns: &[String],
    formats: &[String],
) -> PolarsResult<()> {
    for name in columns {
        let Ok(column) = df.column(name) else {
            continue;
        };
        let series = column.as_materialized_series().clone();
        let normalized = match series.dtype() {
            DataType::Date => continue,
            DataType::Datetime(..) | DataType::Null => series.cast(&DataType::Date)?,
            _ => {
                let text = series.cast(&DataType::String)?;
                let days: Vec<Option<i32>> = text
                    .str()?
                    .iter()
                    .map(|v| v.and_then(|s| parse_date(s, formats)).map(date_to_days))
                    .collect();
                Series::new(series.name().clone(), days).cast(&DataType::Date)?
            }
        };
        df.with_column(normalized)?;
    }

    // Other temporal columns the reader inferred get the same day resolution.
    let datetimes: Vec<Series> = df
        .get_columns()
        .iter()
        .filter(|c| matches!(c.dtype(), DataType::Datetime(..)))
        .map(|c| c.as_materialized_series().cast(&DataType::Date))
        .collect::<PolarsResult<_>>()?;
    for series in datetimes {
        df.with_column(series)?;
    }
    Ok(())
}

/// Parse a date with the first matching format. A trailing time part is ignored.
pub fn parse_date(text: &str, formats: &[String]) -> Option<NaiveDate> {
    let text = text.trim();
    let date_part = text.split([' ', 'T']).next().unwrap_or(text);
    formats
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(date_part, f).ok())
}

pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_CE_DAYS
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(UNIX_EPOCH_CE_DAYS.saturating_add(days))
}

/// Row-aligned dates of a `Date` column.
pub fn date_values(series: &Series) -> PolarsResult<Vec<Option<NaiveDate>>> {
    let days = series.cast(&DataType::Int32)?;
    Ok(days
        .i32()?
        .iter()
        .map(|d| d.and_then(days_to_date))
        .collect())
}

/// Row-aligned values of a numeric column as `f64`.
pub fn float_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let floats = series.cast(&DataType::Float64)?;
    Ok(floats.f64()?.iter().collect())
}

/// Row-aligned values of any column rendered as text.
pub fn text_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let text = series.cast(&DataType::String)?;
    Ok(text.str()?.iter().map(|v| v.map(str::to_string)).collect())
}

/// Sorted distinct non-null values of a column rendered as text.
pub fn distinct_text(series: &Series) -> PolarsResult<Vec<String>> {
    let text = series.cast(&DataType::String)?;
    let values: BTreeSet<&str> = text.str()?.iter().flatten().collect();
    Ok(values.into_iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DataConfig {
        DataConfig::default()
    }

    fn customers() -> DataFrame {
        df!(
            "Loyalty#" => &[1i64, 2, 3],
            "City" => &["Toronto", "Vancouver", "Toronto"],
            "Income" => &[10000.0, 50000.0, 90000.0],
            "EnrollmentYear" => &[2018i64, 2019, 2020],
            "EnrollmentDateOpening" => &[Some("2018-03-01"), Some("not a date"), None],
        )
        .unwrap()
    }

    fn flights() -> DataFrame {
        df!(
            "Loyalty#" => &[1i64, 1, 2],
            "YearMonthDate" => &["1/1/2021", "2/1/2021", "1/1/2021"],
            "NumFlights" => &[2.0, 0.0, 5.0],
            "DistanceKM" => &[1200.0, 0.0, 4100.5],
        )
        .unwrap()
    }

    fn metadata() -> DataFrame {
        df!(
            "column_1" => &["Income", "City"],
            "column_2" => &["Annual income of the customer", " City of residence "],
        )
        .unwrap()
    }

    #[test]
    fn test_roles_are_classified_once() {
        let catalog = Catalog::from_frames(flights(), customers(), metadata(), &config()).unwrap();
        let customers = catalog.customers();
        assert_eq!(customers.role("Loyalty#"), Some(ColumnRole::Identifier));
        assert_eq!(customers.role("Income"), Some(ColumnRole::NumericContinuous));
        assert_eq!(customers.role("EnrollmentYear"), Some(ColumnRole::NumericDiscrete));
        assert_eq!(customers.role("City"), Some(ColumnRole::Categorical));
        assert_eq!(customers.role("EnrollmentDateOpening"), Some(ColumnRole::Date));
        assert_eq!(customers.role("Nope"), None);
        assert_eq!(customers.numeric_columns(), vec!["Income", "EnrollmentYear"]);
        assert_eq!(customers.continuous_columns(), vec!["Income"]);
        assert_eq!(customers.categorical_columns(), vec!["City"]);
        assert_eq!(catalog.flights().date_columns(), vec!["YearMonthDate"]);
    }

    #[test]
    fn test_unparseable_dates_become_null() {
        let catalog = Catalog::from_frames(flights(), customers(), metadata(), &config()).unwrap();
        let series = catalog
            .customers()
            .frame()
            .column("EnrollmentDateOpening")
            .unwrap()
            .as_materialized_series()
            .clone();
        assert_eq!(series.dtype(), &DataType::Date);
        let dates = date_values(&series).unwrap();
        assert_eq!(dates, vec![NaiveDate::from_ymd_opt(2018, 3, 1), None, None]);
    }

    #[test]
    fn test_unlisted_datetime_column_becomes_date() {
        let mut frame = customers();
        // 2021-01-01 and 2021-06-30 at noon, in milliseconds
        let last_flight = Series::new(
            "LastFlight".into(),
            vec![Some(1_609_502_400_000i64), Some(1_625_054_400_000), None],
        )
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .unwrap();
        frame.with_column(last_flight).unwrap();

        let catalog = Catalog::from_frames(flights(), frame, metadata(), &config()).unwrap();
        let customers = catalog.customers();
        assert_eq!(customers.role("LastFlight"), Some(ColumnRole::Date));
        let series = customers
            .frame()
            .column("LastFlight")
            .unwrap()
            .as_materialized_series()
            .clone();
        assert_eq!(series.dtype(), &DataType::Date);
        assert_eq!(
            date_values(&series).unwrap(),
            vec![
                NaiveDate::from_ymd_opt(2021, 1, 1),
                NaiveDate::from_ymd_opt(2021, 6, 30),
                None
            ]
        );
    }

    #[test]
    fn test_month_first_dates_parse() {
        let formats = config().date_formats;
        assert_eq!(
            parse_date("2/1/2021", &formats),
            NaiveDate::from_ymd_opt(2021, 2, 1)
        );
        assert_eq!(
            parse_date("2021-06-30 00:00:00", &formats),
            NaiveDate::from_ymd_opt(2021, 6, 30)
        );
        assert_eq!(parse_date("soon", &formats), None);
    }

    #[test]
    fn test_day_conversion_round_trips_epoch() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(date_to_days(epoch), 0);
        assert_eq!(days_to_date(0), Some(epoch));
    }

    #[test]
    fn test_describe_uses_metadata() {
        let catalog = Catalog::from_frames(flights(), customers(), metadata(), &config()).unwrap();
        assert_eq!(
            catalog.describe("City").as_deref(),
            Some("City of residence")
        );
        assert_eq!(catalog.describe("Gender"), None);
    }
}
