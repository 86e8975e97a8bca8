//! Error types for the grid backtester

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

use crate::Symbol;

pub type Result<T> = std::result::Result<T, GridError>;

#[derive(Debug, Error)]
pub enum GridError {
    /// Parameters that make the grid undefined (non-positive position count,
    /// malformed interval range, non-positive duration, empty series, ...)
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A day inside the requested window has no published candles
    #[error("candle data unavailable for {symbol} on {date}")]
    DataUnavailable { symbol: Symbol, date: NaiveDate },

    #[error("malformed candle data in {path:?} at row {row}: {reason}")]
    MalformedData {
        path: PathBuf,
        row: usize,
        reason: String,
    },

    /// Numeric edge case that slipped past the precondition checks
    #[error("computation error: {0}")]
    ComputationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GridError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        GridError::InvalidConfiguration(msg.into())
    }
}
