//! CSV price history for offline signal runs.
//!
//! One file per coin, `<coin_id>.csv`, with a header row. Required columns:
//! `date` (`YYYY-MM-DD` or RFC 3339) and `close` (or `price`). `volume` is
//! optional.

use crate::domain::error::CoinfolioError;
use crate::domain::market::PricePoint;
use chrono::{DateTime, NaiveDate, Utc};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

fn csv_err(reason: String) -> CoinfolioError {
    CoinfolioError::InvalidInput { reason }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|d| d.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Adapter rooted at the file's directory, plus the coin id it names.
    pub fn for_file(path: &Path) -> Result<(Self, String), CoinfolioError> {
        let coin_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| csv_err(format!("not a csv file: {}", path.display())))?
            .to_string();
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok((Self::new(base), coin_id))
    }

    fn csv_path(&self, coin_id: &str) -> PathBuf {
        self.base_path.join(format!("{coin_id}.csv"))
    }

    /// Daily points sorted oldest first.
    pub fn fetch_history(&self, coin_id: &str) -> Result<Vec<PricePoint>, CoinfolioError> {
        let path = self.csv_path(coin_id);
        let content = fs::read_to_string(&path).map_err(|e| {
            csv_err(format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| csv_err(format!("CSV header error: {e}")))?
            .clone();
        let column = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        let date_col = column(&["date"]).ok_or_else(|| csv_err("missing date column".into()))?;
        let close_col =
            column(&["close", "price"]).ok_or_else(|| csv_err("missing close column".into()))?;
        let volume_col = column(&["volume"]);

        let mut points = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| csv_err(format!("CSV parse error: {e}")))?;
            let row = line + 2;

            let raw_date = record.get(date_col).unwrap_or_default();
            let date = parse_date(raw_date)
                .ok_or_else(|| csv_err(format!("row {row}: invalid date {raw_date:?}")))?;

            let close: f64 = record
                .get(close_col)
                .unwrap_or_default()
                .trim()
                .parse()
                .map_err(|e| csv_err(format!("row {row}: invalid close value: {e}")))?;

            let volume = match volume_col.and_then(|c| record.get(c)) {
                Some(v) if !v.trim().is_empty() => v
                    .trim()
                    .parse()
                    .map_err(|e| csv_err(format!("row {row}: invalid volume value: {e}")))?,
                _ => 0.0,
            };

            points.push(PricePoint::close_only(date, close, volume));
        }

        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    pub fn list_coins(&self) -> Result<Vec<String>, CoinfolioError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            csv_err(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut coins = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| csv_err(format!("directory entry error: {e}")))?;
            let name = entry.file_name();
            if let Some(coin) = name.to_string_lossy().strip_suffix(".csv") {
                coins.push(coin.to_string());
            }
        }
        coins.sort();
        Ok(coins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        fs::write(
            path.join("bitcoin.csv"),
            "date,close,volume\n\
             2024-01-16,42100.5,1200\n\
             2024-01-15,41000.0,1000\n\
             2024-01-17,43000.0,\n",
        )
        .unwrap();
        fs::write(
            path.join("ethereum.csv"),
            "Date,Price\n2024-01-15T00:00:00Z,2500\n",
        )
        .unwrap();
        fs::write(path.join("broken.csv"), "date,close\n2024-01-15,abc\n").unwrap();
        fs::write(path.join("notes.txt"), "ignored").unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_history_sorts_and_parses() {
        let (_dir, path) = setup_test_data();
        let points = CsvAdapter::new(path).fetch_history("bitcoin").unwrap();

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].price, 41000.0);
        assert_eq!(points[0].volume, 1000.0);
        assert_eq!(points[1].price, 42100.5);
        assert_eq!(points[2].volume, 0.0);
        assert!(points[0].date < points[1].date);
    }

    #[test]
    fn price_column_and_rfc3339_dates() {
        let (_dir, path) = setup_test_data();
        let points = CsvAdapter::new(path).fetch_history("ethereum").unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].price, 2500.0);
    }

    #[test]
    fn bad_value_reports_row() {
        let (_dir, path) = setup_test_data();
        let err = CsvAdapter::new(path).fetch_history("broken").unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn missing_file_is_error() {
        let (_dir, path) = setup_test_data();
        assert!(CsvAdapter::new(path).fetch_history("dogecoin").is_err());
    }

    #[test]
    fn list_coins_only_csv() {
        let (_dir, path) = setup_test_data();
        let coins = CsvAdapter::new(path).list_coins().unwrap();
        assert_eq!(coins, vec!["bitcoin", "broken", "ethereum"]);
    }

    #[test]
    fn for_file_splits_dir_and_coin() {
        let (_dir, path) = setup_test_data();
        let (adapter, coin) = CsvAdapter::for_file(&path.join("bitcoin.csv")).unwrap();
        assert_eq!(coin, "bitcoin");
        assert_eq!(adapter.fetch_history(&coin).unwrap().len(), 3);
    }
}
