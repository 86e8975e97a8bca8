//! Run parameters
//!
//! `BaseParameters` holds what is fixed for a whole sweep (anchor price,
//! capital, window length); `RunParameters` adds the per-interval sizing.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::summary::ReportConstants;
use crate::CandleBar;

/// Upper bound on grid levels for one run
pub const MAX_POSITION_COUNT: i64 = 10_000_000;

/// Sweep-wide inputs, derived once from the candle series and the config
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseParameters {
    /// Below-market entry anchor: floor(first open - 1)
    pub start_price: f64,
    pub floor_price: f64,
    pub principal: f64,
    /// Principal plus borrowed capital, floored
    pub total_asset: f64,
    /// Inclusive day count of the window
    pub duration: i64,
    pub progress: f64,
    pub strict: bool,
}

impl BaseParameters {
    /// Derive the sweep-wide parameters from the first bar of the series
    pub fn derive(
        candles: &[CandleBar],
        principal: f64,
        floor_price: f64,
        duration: i64,
        constants: &ReportConstants,
    ) -> Result<Self> {
        let first = candles
            .first()
            .ok_or_else(|| GridError::invalid("candle series is empty"))?;

        if principal.is_nan() || principal <= 0.0 {
            return Err(GridError::invalid(format!(
                "principal must be positive (got {})",
                principal
            )));
        }

        Ok(BaseParameters {
            start_price: start_price(first),
            floor_price,
            principal,
            total_asset: (principal * constants.asset_multiplier()).floor(),
            duration,
            progress: 1.0,
            strict: true,
        })
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Total downward budget the grid must cover
    pub fn deficit(&self) -> f64 {
        self.start_price - self.floor_price
    }
}

/// Anchor price of a run: one unit under the first open, floored
pub fn start_price(first: &CandleBar) -> f64 {
    (first.open - 1.0).floor()
}

/// Number of grid levels the deficit budget supports at this interval
///
/// May be zero or negative; `RunParameters::new` rejects those.
pub fn position_count(deficit: f64, interval: f64) -> i64 {
    (deficit / interval).floor() as i64
}

/// Per-interval configuration of one simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    pub start_price: f64,
    pub floor_price: f64,
    pub deficit: f64,
    pub interval: f64,
    pub total_asset: f64,
    pub position_count: usize,
    /// Capital allocated per grid level, floored
    pub position_amount: f64,
    pub progress: f64,
    pub strict: bool,
    pub duration: i64,
    pub principal: f64,
}

impl RunParameters {
    /// Size the grid for one interval value
    pub fn new(base: &BaseParameters, interval: f64) -> Result<Self> {
        if !interval.is_finite() || interval <= 0.0 {
            return Err(GridError::invalid(format!(
                "interval must be positive (got {})",
                interval
            )));
        }
        if base.progress.is_nan() || base.progress <= 0.0 || base.progress > 1.0 {
            return Err(GridError::invalid(format!(
                "progress must be in (0, 1] (got {})",
                base.progress
            )));
        }

        // Stepping the level down must actually move it
        if base.start_price - interval == base.start_price {
            return Err(GridError::invalid(format!(
                "interval {} is below the price resolution at {}",
                interval, base.start_price
            )));
        }

        let deficit = base.deficit();
        let count = position_count(deficit, interval);
        if count < 1 {
            return Err(GridError::invalid(format!(
                "interval {} leaves no grid levels: deficit {} gives position count {}",
                interval, deficit, count
            )));
        }
        if count > MAX_POSITION_COUNT {
            return Err(GridError::invalid(format!(
                "interval {} gives {} grid levels, more than {}",
                interval, count, MAX_POSITION_COUNT
            )));
        }

        Ok(RunParameters {
            start_price: base.start_price,
            floor_price: base.floor_price,
            deficit,
            interval,
            total_asset: base.total_asset,
            position_count: count as usize,
            position_amount: (base.total_asset / count as f64).floor(),
            progress: base.progress,
            strict: base.strict,
            duration: base.duration,
            principal: base.principal,
        })
    }
}
