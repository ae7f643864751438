//! CSV export of a filtered view.

use chrono::{DateTime, Local};
use color_eyre::Result;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::state::Page;

/// Write every row and column of `frame` as UTF-8 CSV with a header row.
pub fn write_csv(frame: &DataFrame, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut df = frame.clone();
    let file = File::create(path)?;
    CsvWriter::new(file)
        .with_separator(b',')
        .include_header(true)
        .finish(&mut df)?;
    info!(rows = df.height(), path = %path.display(), "exported csv");
    Ok(df.height())
}

/// File stem for exports of a page, e.g. `flights-explorer-20240131-093000`.
pub fn export_stem(page: Page, now: DateTime<Local>) -> String {
    let slug: String = page
        .title()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    format!("{slug}-{}", now.format("%Y%m%d-%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_csv_has_header_and_all_rows() {
        let frame = df!(
            "Loyalty#" => &[1i64, 2],
            "City" => &["Québec", "Toronto, ON"],
            "Income" => &[Some(1.5), None],
        )
        .unwrap();
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("view.csv");
        assert_eq!(write_csv(&frame, &path).unwrap(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Loyalty#,City,Income");
        assert_eq!(lines[1], "1,Québec,1.5");
        assert_eq!(lines[2], "2,\"Toronto, ON\",");
    }

    #[test]
    fn test_export_stem() {
        let now = Local.with_ymd_and_hms(2024, 1, 31, 9, 30, 0).unwrap();
        assert_eq!(
            export_stem(Page::Insights, now),
            "insights-graphs-20240131-093000"
        );
    }
}
