//! Grid Backtester
//!
//! Replays a below-market grid trading strategy over minute candles, summarizes
//! each run (fills, realized and unrealized profit, return and risk rates) and
//! sweeps the grid interval to compare spacings over the same window.

pub mod config;
pub mod data;
pub mod error;
pub mod params;
pub mod report;
pub mod simulator;
pub mod summary;
pub mod sweep;
pub mod types;

pub use config::Config;
pub use data::{CandleSource, CsvCandleSource};
pub use error::{GridError, Result};
pub use params::{BaseParameters, RunParameters};
pub use report::{ReportParams, SimulationReport, SortKey};
pub use simulator::{GridSimulator, GridState};
pub use summary::{PerformanceSummarizer, ReportConstants, Summary};
pub use sweep::{DetailedRunResult, IntervalSpec, SummaryOnlyRunResult, SweepEntry, SweepRunner};
pub use types::*;
