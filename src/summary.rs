//! Performance summary
//!
//! Reduces the fills of one run to counts, realized/unrealized profit, return
//! and risk figures. Every monetary figure is rounded to 2 decimals before it
//! feeds the next formula.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::params::RunParameters;
use crate::{round2, Position};

/// Fixed figures the report arithmetic depends on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportConstants {
    /// Quote currency to report currency
    pub conversion_rate: f64,
    /// Borrowed capital as a multiple of principal
    pub leverage: f64,
}

impl Default for ReportConstants {
    fn default() -> Self {
        ReportConstants {
            conversion_rate: 7.1,
            leverage: 2.0,
        }
    }
}

impl ReportConstants {
    /// Total capital as a multiple of principal (principal plus borrowed)
    pub fn asset_multiplier(&self) -> f64 {
        1.0 + self.leverage
    }
}

/// Aggregate statistics of one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub completed_count: usize,
    pub uncompleted_count: usize,
    pub count_per_day: usize,
    pub completed_per_day: usize,
    /// Buys that filled above the bar open
    pub fee_count: usize,
    /// Report currency
    pub total_profit: f64,
    pub completed_profit: f64,
    pub uncompleted_profit: f64,
    pub average_profit: f64,
    /// Percent of principal
    pub total_profit_rate: f64,
    pub average_profit_rate: f64,
    /// Remaining cover of the borrowed capital; below 1 the account is underwater
    pub risk_rate: f64,
}

impl Summary {
    /// The ratio is informational; the simulation never stops on it
    pub fn is_liquidated(&self) -> bool {
        self.risk_rate < 1.0
    }
}

pub struct PerformanceSummarizer {
    constants: ReportConstants,
}

impl Default for PerformanceSummarizer {
    fn default() -> Self {
        Self::new(ReportConstants::default())
    }
}

impl PerformanceSummarizer {
    pub fn new(constants: ReportConstants) -> Self {
        PerformanceSummarizer { constants }
    }

    pub fn constants(&self) -> &ReportConstants {
        &self.constants
    }

    pub fn summarize(&self, positions: &[Position], params: &RunParameters) -> Result<Summary> {
        if params.duration <= 0 {
            return Err(GridError::invalid(format!(
                "duration must be at least one day (got {})",
                params.duration
            )));
        }
        if params.principal.is_nan() || params.principal <= 0.0 {
            return Err(GridError::invalid(format!(
                "principal must be positive (got {})",
                params.principal
            )));
        }
        let ReportConstants {
            conversion_rate,
            leverage,
        } = self.constants;
        if conversion_rate.is_nan() || conversion_rate <= 0.0 || leverage.is_nan() || leverage <= 0.0
        {
            return Err(GridError::invalid(format!(
                "conversion rate and leverage must be positive (got {}, {})",
                conversion_rate, leverage
            )));
        }

        let count = positions.len();
        let completed_count = positions.iter().filter(|p| p.is_completed()).count();
        let uncompleted_count = count - completed_count;

        let profit_sum = |completed: bool| {
            positions
                .iter()
                .filter(|p| p.is_completed() == completed)
                .fold(0.0, |total, p| total + p.meta.profit)
        };
        let completed_profit = round2(profit_sum(true) * conversion_rate);
        let uncompleted_profit = round2(profit_sum(false) * conversion_rate);
        let total_profit = round2(completed_profit + uncompleted_profit);

        let principal = params.principal;
        let risk_rate = round2(
            (self.constants.asset_multiplier() * principal + total_profit) / (leverage * principal),
        );
        let total_profit_rate = round2(total_profit / conversion_rate / principal * 100.0);

        let fee_count = positions.iter().filter(|p| p.is_fee_eligible()).count();

        let duration = params.duration as usize;
        let days = params.duration as f64;
        let summary = Summary {
            count,
            completed_count,
            uncompleted_count,
            count_per_day: count / duration,
            completed_per_day: completed_count / duration,
            fee_count,
            total_profit,
            completed_profit,
            uncompleted_profit,
            average_profit: round2(total_profit / days),
            total_profit_rate,
            average_profit_rate: round2(total_profit_rate / days),
            risk_rate,
        };

        for value in [summary.total_profit, summary.risk_rate, summary.total_profit_rate] {
            if !value.is_finite() {
                return Err(GridError::ComputationError(format!(
                    "non-finite summary figure for interval {}",
                    params.interval
                )));
            }
        }

        Ok(summary)
    }
}
