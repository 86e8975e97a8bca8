//! Simulation report
//!
//! Echo of the run inputs plus one entry per interval, ready to serialize or
//! to hand to an external renderer.

use chrono::FixedOffset;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{GridError, Result};
use crate::params::BaseParameters;
use crate::sweep::{IntervalSpec, SweepEntry};
use crate::{format_timestamp, CandleBar, Symbol};

/// Inputs and derived figures shared by every entry of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportParams {
    pub symbol: Symbol,
    /// Open of the first bar, display offset
    pub start: String,
    /// Close of the last bar, display offset
    pub end: String,
    /// Days
    pub duration: i64,
    pub principal: f64,
    pub total_asset: f64,
    pub start_price: f64,
    /// Close of the last bar
    pub close_price: f64,
    pub floor_price: f64,
    pub deficit: f64,
    pub interval: IntervalSpec,
    pub progress: f64,
    pub strict: bool,
}

impl ReportParams {
    pub fn new(
        symbol: Symbol,
        candles: &[CandleBar],
        base: &BaseParameters,
        interval: IntervalSpec,
        offset: FixedOffset,
    ) -> Result<Self> {
        let (first, last) = match (candles.first(), candles.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(GridError::invalid("candle series is empty")),
        };

        Ok(ReportParams {
            symbol,
            start: format_timestamp(first.start_time, offset),
            end: format_timestamp(last.end_time, offset),
            duration: base.duration,
            principal: base.principal,
            total_asset: base.total_asset,
            start_price: base.start_price,
            close_price: last.close,
            floor_price: base.floor_price,
            deficit: base.deficit(),
            interval,
            progress: base.progress,
            strict: base.strict,
        })
    }
}

impl fmt::Display for IntervalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalSpec::Single(interval) => write!(f, "{}", interval),
            IntervalSpec::Range { start, end, step } if *step == 1.0 => {
                write!(f, "{} ~ {}", start, end)
            }
            IntervalSpec::Range { start, end, step } => {
                write!(f, "{} ~ {} (step {})", start, end, step)
            }
        }
    }
}

/// Ordering for console listings of a range sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Total profit, best first
    Profit,
    /// Risk rate, safest first
    Risk,
    /// Interval, ascending
    #[default]
    Interval,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "profit" => Ok(SortKey::Profit),
            "risk" => Ok(SortKey::Risk),
            "interval" => Ok(SortKey::Interval),
            _ => Err(format!(
                "Unknown sort key: {}. Use 'profit', 'risk' or 'interval'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub params: ReportParams,
    pub summaries: Vec<SweepEntry>,
}

impl SimulationReport {
    pub fn new(params: ReportParams, summaries: Vec<SweepEntry>) -> Self {
        SimulationReport { params, summaries }
    }

    /// Entries ordered by `key`; skipped intervals always come last
    pub fn sorted_entries(&self, key: SortKey) -> Vec<&SweepEntry> {
        self.summaries
            .iter()
            .sorted_by(|a, b| match (a.summary(), b.summary()) {
                (Some(sa), Some(sb)) => match key {
                    SortKey::Profit => sb
                        .total_profit
                        .partial_cmp(&sa.total_profit)
                        .unwrap_or(Ordering::Equal),
                    SortKey::Risk => sb
                        .risk_rate
                        .partial_cmp(&sa.risk_rate)
                        .unwrap_or(Ordering::Equal),
                    SortKey::Interval => a
                        .interval()
                        .partial_cmp(&b.interval())
                        .unwrap_or(Ordering::Equal),
                },
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a
                    .interval()
                    .partial_cmp(&b.interval())
                    .unwrap_or(Ordering::Equal),
            })
            .collect()
    }

    pub fn file_name(&self) -> String {
        let day = |s: &str| s.split_whitespace().next().unwrap_or_default().to_string();
        format!(
            "grid_{}_{}_{}.json",
            self.params.symbol.as_str().to_lowercase(),
            day(&self.params.start),
            day(&self.params.end)
        )
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON into `dir`, returning the file path
    pub fn write_json(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(self.file_name());
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, self)?;
        info!("Report written to {}", path.display());
        Ok(path)
    }
}
