//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files, with environment
//! variable overrides for the data and results directories.

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::data::parse_date;
use crate::error::GridError;
use crate::summary::ReportConstants;
use crate::sweep::IntervalSpec;
use crate::Symbol;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.apply_env();
        Ok(config)
    }

    /// Directory overrides from the environment (a `.env` file is honored by the binary)
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("GRID_DATA_DIR") {
            self.market.data_dir = dir;
        }
        if let Ok(dir) = std::env::var("GRID_RESULTS_DIR") {
            self.report.results_dir = dir;
        }
    }

    pub fn symbol(&self) -> Symbol {
        Symbol::new(&self.market.symbol)
    }

    /// Parsed `[start, end]` window; rejects an inverted range
    pub fn window(&self) -> crate::Result<(NaiveDate, NaiveDate)> {
        let start = parse_date(&self.window.start)?;
        let end = parse_date(&self.window.end)?;
        if start > end {
            return Err(GridError::invalid(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        Ok((start, end))
    }

    /// Inclusive day count of the window
    pub fn duration(&self) -> crate::Result<i64> {
        let (start, end) = self.window()?;
        Ok((end - start).num_days() + 1)
    }

    /// A single interval wins over a range when both are set; an interval of
    /// 0 counts as unset
    pub fn interval_spec(&self) -> crate::Result<IntervalSpec> {
        match (
            self.grid.interval.filter(|interval| *interval != 0.0),
            self.grid.start_interval,
            self.grid.end_interval,
        ) {
            (Some(interval), _, _) => Ok(IntervalSpec::Single(interval)),
            (None, Some(start), Some(end)) => Ok(IntervalSpec::Range {
                start,
                end,
                step: self.grid.interval_step,
            }),
            _ => Err(GridError::invalid(
                "missing interval (or both start_interval and end_interval)",
            )),
        }
    }

    pub fn display_offset(&self) -> crate::Result<FixedOffset> {
        FixedOffset::east_opt(self.market.utc_offset_hours * 3600).ok_or_else(|| {
            GridError::invalid(format!(
                "utc_offset_hours out of range: {}",
                self.market.utc_offset_hours
            ))
        })
    }

    pub fn report_constants(&self) -> ReportConstants {
        ReportConstants {
            conversion_rate: self.report.conversion_rate,
            leverage: self.report.leverage,
        }
    }
}

/// Market and data source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub symbol: String,
    pub data_dir: String,
    /// Offset used when formatting fill times (the vendor days start at 08:00 UTC+8)
    pub utc_offset_hours: i32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        MarketConfig {
            symbol: "ETHBUSD".to_string(),
            data_dir: "data".to_string(),
            utc_offset_hours: 8,
        }
    }
}

/// Backtest window, calendar days `YYYY-MM-DD`, both inclusive
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub start: String,
    pub end: String,
}

/// Grid strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub principal: f64,
    /// Worst-case price the grid must survive
    pub floor_price: f64,
    pub interval: Option<f64>,
    pub start_interval: Option<f64>,
    pub end_interval: Option<f64>,
    pub interval_step: f64,
    /// Fraction of the interval taken as profit on exit, in (0, 1]
    pub progress: f64,
    /// Re-open a sold level at its original buy price
    pub strict: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            principal: 1000.0,
            floor_price: 0.0,
            interval: None,
            start_interval: None,
            end_interval: None,
            interval_step: 1.0,
            progress: 1.0,
            strict: true,
        }
    }
}

/// Report configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Quote currency to report currency
    pub conversion_rate: f64,
    /// Borrowed capital as a multiple of principal
    pub leverage: f64,
    pub results_dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        let constants = ReportConstants::default();
        ReportConfig {
            conversion_rate: constants.conversion_rate,
            leverage: constants.leverage,
            results_dir: "results".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub parallel: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig { parallel: true }
    }
}
