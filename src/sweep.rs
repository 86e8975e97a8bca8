//! Interval sweeps
//!
//! Runs the simulator and the summarizer for one interval, or for every value
//! of a closed interval range, over the same candle series.

use chrono::{FixedOffset, Offset, Utc};
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{GridError, Result};
use crate::params::{BaseParameters, RunParameters};
use crate::simulator::GridSimulator;
use crate::summary::{PerformanceSummarizer, ReportConstants, Summary};
use crate::{CandleBar, Position};

/// Guards the range end against float drift in `(end - start) / step`
const RANGE_EPSILON: f64 = 1e-9;

/// Upper bound on the number of intervals one range may expand to
pub const MAX_SWEEP_POINTS: usize = 100_000;

/// Which interval values to run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum IntervalSpec {
    Single(f64),
    /// `start, start + step, ...` up to and including `end`
    Range { start: f64, end: f64, step: f64 },
}

impl IntervalSpec {
    pub fn range(start: f64, end: f64) -> Self {
        IntervalSpec::Range {
            start,
            end,
            step: 1.0,
        }
    }

    /// Interval values in ascending order
    pub fn values(&self) -> Result<Vec<f64>> {
        match *self {
            IntervalSpec::Single(interval) => Ok(vec![interval]),
            IntervalSpec::Range { start, end, step } => {
                if !start.is_finite() || !end.is_finite() || start <= 0.0 {
                    return Err(GridError::invalid(format!(
                        "interval range bounds must be positive (got {} ~ {})",
                        start, end
                    )));
                }
                if start > end {
                    return Err(GridError::invalid(format!(
                        "start interval {} is greater than end interval {}",
                        start, end
                    )));
                }
                if !step.is_finite() || step <= 0.0 {
                    return Err(GridError::invalid(format!(
                        "interval step must be positive (got {})",
                        step
                    )));
                }

                let count = ((end - start) / step + RANGE_EPSILON).floor() + 1.0;
                if !count.is_finite() || count > MAX_SWEEP_POINTS as f64 {
                    return Err(GridError::invalid(format!(
                        "interval range {} ~ {} step {} expands to more than {} values",
                        start, end, step, MAX_SWEEP_POINTS
                    )));
                }
                let count = count as usize;
                Ok((0..count).map(|i| start + i as f64 * step).collect())
            }
        }
    }
}

/// Single-interval result with the full fill list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedRunResult {
    pub interval: f64,
    pub position_count: usize,
    pub position_amount: f64,
    pub summary: Summary,
    pub transactions: Vec<Position>,
}

/// Range-sweep result; the fills are dropped to keep scans compact
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryOnlyRunResult {
    pub interval: f64,
    pub position_count: usize,
    pub position_amount: f64,
    pub summary: Summary,
}

impl From<DetailedRunResult> for SummaryOnlyRunResult {
    fn from(result: DetailedRunResult) -> Self {
        SummaryOnlyRunResult {
            interval: result.interval,
            position_count: result.position_count,
            position_amount: result.position_amount,
            summary: result.summary,
        }
    }
}

/// One sweep point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SweepEntry {
    Detailed(DetailedRunResult),
    SummaryOnly(SummaryOnlyRunResult),
    /// The interval could not be sized (e.g. no grid level fits the deficit)
    Skipped { interval: f64, reason: String },
}

impl SweepEntry {
    pub fn interval(&self) -> f64 {
        match self {
            SweepEntry::Detailed(r) => r.interval,
            SweepEntry::SummaryOnly(r) => r.interval,
            SweepEntry::Skipped { interval, .. } => *interval,
        }
    }

    pub fn summary(&self) -> Option<&Summary> {
        match self {
            SweepEntry::Detailed(r) => Some(&r.summary),
            SweepEntry::SummaryOnly(r) => Some(&r.summary),
            SweepEntry::Skipped { .. } => None,
        }
    }

    pub fn position_count(&self) -> Option<usize> {
        match self {
            SweepEntry::Detailed(r) => Some(r.position_count),
            SweepEntry::SummaryOnly(r) => Some(r.position_count),
            SweepEntry::Skipped { .. } => None,
        }
    }

    pub fn transactions(&self) -> Option<&[Position]> {
        match self {
            SweepEntry::Detailed(r) => Some(&r.transactions),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, SweepEntry::Skipped { .. })
    }
}

pub struct SweepRunner {
    summarizer: PerformanceSummarizer,
    offset: FixedOffset,
    parallel: bool,
}

impl Default for SweepRunner {
    fn default() -> Self {
        Self::new(ReportConstants::default())
    }
}

impl SweepRunner {
    pub fn new(constants: ReportConstants) -> Self {
        SweepRunner {
            summarizer: PerformanceSummarizer::new(constants),
            offset: Utc.fix(),
            parallel: false,
        }
    }

    pub fn with_display_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Run range points on the rayon pool; entry order is unaffected
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Size, simulate and summarize one interval
    pub fn run_point(
        &self,
        candles: &[CandleBar],
        base: &BaseParameters,
        interval: f64,
    ) -> Result<DetailedRunResult> {
        let params = RunParameters::new(base, interval)?;
        let transactions = GridSimulator::new(params)?
            .with_display_offset(self.offset)
            .simulate(candles)?;
        let summary = self.summarizer.summarize(&transactions, &params)?;

        info!(
            "Interval {}: {} levels x {}, {} fills ({} completed), total profit {:.2}, risk rate {:.2}",
            interval,
            params.position_count,
            params.position_amount,
            summary.count,
            summary.completed_count,
            summary.total_profit,
            summary.risk_rate
        );
        if summary.is_liquidated() {
            warn!(
                "Interval {}: risk rate {:.2} is below 1, the account would have been liquidated",
                interval, summary.risk_rate
            );
        }

        Ok(DetailedRunResult {
            interval,
            position_count: params.position_count,
            position_amount: params.position_amount,
            summary,
            transactions,
        })
    }

    pub fn run(
        &self,
        candles: &[CandleBar],
        base: &BaseParameters,
        spec: IntervalSpec,
    ) -> Result<Vec<SweepEntry>> {
        self.run_with_progress(candles, base, spec, None)
    }

    /// Single mode propagates any failure. Range mode aborts on sweep-wide
    /// problems and turns a failing point into `SweepEntry::Skipped`.
    pub fn run_with_progress(
        &self,
        candles: &[CandleBar],
        base: &BaseParameters,
        spec: IntervalSpec,
        progress: Option<&ProgressBar>,
    ) -> Result<Vec<SweepEntry>> {
        validate_base(candles, base)?;

        if let IntervalSpec::Single(interval) = spec {
            let result = self.run_point(candles, base, interval)?;
            if let Some(pb) = progress {
                pb.inc(1);
            }
            return Ok(vec![SweepEntry::Detailed(result)]);
        }

        let values = spec.values()?;
        if let (Some(first), Some(last)) = (values.first(), values.last()) {
            info!(
                "Sweeping {} interval values from {} to {}",
                values.len(),
                first,
                last
            );
        }

        let point = |interval: f64| {
            let entry = match self.run_point(candles, base, interval) {
                Ok(result) => SweepEntry::SummaryOnly(result.into()),
                Err(e) => {
                    warn!("Skipping interval {}: {}", interval, e);
                    SweepEntry::Skipped {
                        interval,
                        reason: e.to_string(),
                    }
                }
            };
            if let Some(pb) = progress {
                pb.inc(1);
            }
            entry
        };

        let entries: Vec<SweepEntry> = if self.parallel {
            values.par_iter().map(|&interval| point(interval)).collect()
        } else {
            values.iter().map(|&interval| point(interval)).collect()
        };

        Ok(entries)
    }
}

/// Checks shared by every point; failing any of them aborts the sweep
fn validate_base(candles: &[CandleBar], base: &BaseParameters) -> Result<()> {
    if candles.is_empty() {
        return Err(GridError::invalid("candle series is empty"));
    }
    if base.duration <= 0 {
        return Err(GridError::invalid(format!(
            "duration must be at least one day (got {})",
            base.duration
        )));
    }
    if base.principal.is_nan() || base.principal <= 0.0 {
        return Err(GridError::invalid(format!(
            "principal must be positive (got {})",
            base.principal
        )));
    }
    if base.progress.is_nan() || base.progress <= 0.0 || base.progress > 1.0 {
        return Err(GridError::invalid(format!(
            "progress must be in (0, 1] (got {})",
            base.progress
        )));
    }
    Ok(())
}
