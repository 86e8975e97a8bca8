//! Candle supply
//!
//! Loads minute klines from vendor daily archives that were already extracted
//! to CSV (`{SYMBOL}-1m-{YYYY-MM-DD}.csv`, no header) and stitches the days of
//! a window into one continuous series. Any missing day fails the whole load.

use chrono::{Duration, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{GridError, Result};
use crate::{CandleBar, Symbol};

/// Kline resolution of the daily archives
pub const RESOLUTION: &str = "1m";

/// Timestamps above this are microseconds (newer archives), not millis
const MICROS_THRESHOLD: i64 = 100_000_000_000_000;

/// Anything that can hand the engine a complete, ordered candle series
pub trait CandleSource {
    /// Candles for `[start, end]` inclusive. Fails with `DataUnavailable` if
    /// any day is missing; never returns a partial series.
    fn get_candles(&self, symbol: &Symbol, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<CandleBar>>;
}

/// Reads the extracted daily CSV files from a local directory
#[derive(Debug, Clone)]
pub struct CsvCandleSource {
    data_dir: PathBuf,
}

impl CsvCandleSource {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        CsvCandleSource {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn day_path(&self, symbol: &Symbol, date: NaiveDate) -> PathBuf {
        day_path(&self.data_dir, symbol, date)
    }
}

impl CandleSource for CsvCandleSource {
    fn get_candles(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CandleBar>> {
        if start > end {
            return Err(GridError::invalid(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }

        let mut candles = Vec::new();
        for date in days_in_window(start, end) {
            let path = self.day_path(symbol, date);
            if !path.exists() {
                return Err(GridError::DataUnavailable {
                    symbol: symbol.clone(),
                    date,
                });
            }

            let day = load_day_csv(&path)?;
            if day.is_empty() {
                return Err(GridError::DataUnavailable {
                    symbol: symbol.clone(),
                    date,
                });
            }
            debug!("Loaded {} candles for {} on {}", day.len(), symbol, date);
            candles.extend(day);
        }

        info!(
            "Loaded {} candles for {} from {} to {}",
            candles.len(),
            symbol,
            start,
            end
        );
        Ok(candles)
    }
}

/// Path of one day's archive inside `data_dir`
pub fn day_path(data_dir: impl AsRef<Path>, symbol: &Symbol, date: NaiveDate) -> PathBuf {
    data_dir.as_ref().join(format!(
        "{}-{}-{}.csv",
        symbol.as_str(),
        RESOLUTION,
        date.format("%Y-%m-%d")
    ))
}

/// Load one header-less daily kline CSV with validation
///
/// Columns: open time, open, high, low, close, volume, close time, quote
/// volume, then vendor extras that are ignored.
pub fn load_day_csv(path: impl AsRef<Path>) -> Result<Vec<CandleBar>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut candles = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        let row = row_idx + 1;
        let malformed = |reason: String| GridError::MalformedData {
            path: path.to_path_buf(),
            row,
            reason,
        };

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        // Some re-published archives carry a header row
        if row == 1 && record.get(0).map(str::trim) == Some("open_time") {
            continue;
        }
        if record.len() < 8 {
            return Err(malformed(format!(
                "expected at least 8 columns, got {}",
                record.len()
            )));
        }

        let int_field = |idx: usize, name: &str| -> Result<i64> {
            record[idx]
                .trim()
                .parse::<i64>()
                .map(normalize_timestamp)
                .map_err(|e| malformed(format!("failed to parse {}: {}", name, e)))
        };
        let float_field = |idx: usize, name: &str| -> Result<f64> {
            record[idx]
                .trim()
                .parse::<f64>()
                .map_err(|e| malformed(format!("failed to parse {}: {}", name, e)))
        };

        let bar = CandleBar::new(
            int_field(0, "open time")?,
            float_field(1, "open")?,
            float_field(2, "high")?,
            float_field(3, "low")?,
            float_field(4, "close")?,
            float_field(5, "volume")?,
            int_field(6, "close time")?,
            float_field(7, "quote volume")?,
        )
        .map_err(|e| malformed(e.to_string()))?;

        candles.push(bar);
    }

    Ok(candles)
}

fn normalize_timestamp(ts: i64) -> i64 {
    if ts >= MICROS_THRESHOLD {
        ts / 1000
    } else {
        ts
    }
}

/// Every calendar day in `[start, end]`
pub fn days_in_window(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let days = (end - start).num_days().max(-1) + 1;
    (0..days).map(move |i| start + Duration::days(i))
}

/// Days in `[start, end]` whose archive is not present in `data_dir`
pub fn find_missing_days(
    data_dir: impl AsRef<Path>,
    symbol: &Symbol,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<NaiveDate> {
    days_in_window(start, end)
        .filter(|date| !day_path(data_dir.as_ref(), symbol, *date).exists())
        .collect()
}

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|_| {
        GridError::invalid(format!(
            "failed to parse date: {:?}, use YYYY-MM-DD format",
            date_str
        ))
    })
}
