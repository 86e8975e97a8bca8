//! Core data types shared by the simulator, the summarizer and the report

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for candle data
#[derive(Debug, Error)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be finite and positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("end time ({end_time}) precedes start time ({start_time})")]
    EndBeforeStart { start_time: i64, end_time: i64 },
}

/// One-minute OHLCV bar as published in the vendor daily archives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleBar {
    /// Bar open instant, epoch millis
    pub start_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base asset volume
    pub volume: f64,
    /// Bar close instant, epoch millis
    pub end_time: i64,
    /// Quote asset volume
    pub quote_volume: f64,
}

impl CandleBar {
    /// Create a new bar with validation
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        start_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        end_time: i64,
        quote_volume: f64,
    ) -> Result<Self, CandleValidationError> {
        let bar = Self {
            start_time,
            open,
            high,
            low,
            close,
            volume,
            end_time,
            quote_volume,
        };
        bar.validate()?;
        Ok(bar)
    }

    /// Validate the OHLC invariant `low <= open, close <= high`
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(CandleValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(CandleValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(CandleValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        if self.end_time < self.start_time {
            return Err(CandleValidationError::EndBeforeStart {
                start_time: self.start_time,
                end_time: self.end_time,
            });
        }

        Ok(())
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.start_time)
    }
}

/// Trading pair symbol using Arc<str> for cheap cloning
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

/// Custom serde for Arc<str>
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(std::sync::Arc::from(s.as_ref().to_uppercase().as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Fills and positions
// ============================================================================

/// OHLC snapshot of the bar that triggered a fill
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarSnapshot {
    pub start_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl From<&CandleBar> for BarSnapshot {
    fn from(bar: &CandleBar) -> Self {
        BarSnapshot {
            start_time: bar.start_time,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
        }
    }
}

/// One side of a grid level: the price, when, and the bar it happened on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub price: f64,
    /// Start time of the triggering bar, epoch millis
    pub timestamp: i64,
    /// `YYYY-MM-DD HH:MM:SS` in the display offset
    pub time: String,
    pub bar: BarSnapshot,
}

impl Fill {
    pub fn new(price: f64, bar: &CandleBar, offset: FixedOffset) -> Self {
        Fill {
            price,
            timestamp: bar.start_time,
            time: format_timestamp(bar.start_time, offset),
            bar: BarSnapshot::from(bar),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionMeta {
    /// Capital committed to this level
    pub amount: f64,
    /// Units bought, rounded to 2 decimals
    pub rate: f64,
    /// Mark-to-market profit while open, realized profit once sold
    pub profit: f64,
}

/// A grid level's buy fill and, once closed, its matching sell fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub meta: PositionMeta,
    pub buy: Fill,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell: Option<Fill>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.sell.is_none()
    }

    pub fn is_completed(&self) -> bool {
        self.sell.is_some()
    }

    /// Buy filled above the bar open, i.e. it crossed the book instead of resting
    pub fn is_fee_eligible(&self) -> bool {
        self.buy.bar.open < self.buy.price
    }
}

/// Format epoch millis as `YYYY-MM-DD HH:MM:SS` in the given offset
pub fn format_timestamp(millis: i64, offset: FixedOffset) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(dt) => dt
            .with_timezone(&offset)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => millis.to_string(),
    }
}

// ============================================================================
// Monetary rounding
// ============================================================================

/// Round to 2 decimals: decimal rounding of the exact binary value, ties away
/// from zero.
///
/// ```
/// use grid_backtester::round2;
/// assert_eq!(round2(1.005), 1.0);
/// assert_eq!(round2(0.125), 0.13);
/// assert_eq!(round2(-0.125), -0.13);
/// ```
pub fn round2(value: f64) -> f64 {
    round_dp(value, 2)
}

/// Round to `dp` decimals, ties away from zero. Non-finite values pass through.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    match Decimal::from_f64_retain(value) {
        Some(d) => d
            .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
            .to_string()
            .parse()
            .unwrap_or(value),
        None => value,
    }
}
