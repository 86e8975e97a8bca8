//! Grid simulator
//!
//! Walks a candle series forward and produces the ordered buy/sell fills of a
//! long-only grid.
//!
//! ## How it works:
//! 1. Buy phase: while the bar's low trades under the next buy level and the
//!    grid has free levels, open a position at that level and step the level
//!    down by one interval. Several levels can fill on the same bar.
//! 2. Sell phase: every open position not opened on this bar is sold once the
//!    bar's high clears `buy + interval * progress`, otherwise it is marked to
//!    the bar's close.
//!
//! The per-bar update is a pure reducer (`GridSimulator::step`), so a single
//! bar can be tested in isolation.

use chrono::{FixedOffset, Offset, Utc};
use tracing::{debug, trace};

use crate::error::{GridError, Result};
use crate::params::RunParameters;
use crate::{round2, CandleBar, Fill, Position, PositionMeta};

/// State carried from one bar to the next
#[derive(Debug, Clone, PartialEq)]
pub struct GridState {
    /// Price at which the next level opens
    pub next_buy_price: f64,
    /// Level most recently scheduled by a buy; a sell moves `next_buy_price`
    /// back up but leaves this where it was
    pub next_buy_price_backup: f64,
    positions: Vec<Position>,
    open_count: usize,
}

impl GridState {
    pub fn new(start_price: f64) -> Self {
        GridState {
            next_buy_price: start_price,
            next_buy_price_backup: start_price,
            positions: Vec::new(),
            open_count: 0,
        }
    }

    /// Positions in fill order
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn into_positions(self) -> Vec<Position> {
        self.positions
    }

    /// Positions bought and not yet sold
    pub fn open_count(&self) -> usize {
        self.open_count
    }
}

pub struct GridSimulator {
    params: RunParameters,
    offset: FixedOffset,
}

impl GridSimulator {
    pub fn new(params: RunParameters) -> Result<Self> {
        if params.position_count == 0 {
            return Err(GridError::invalid(format!(
                "position count must be at least 1 (interval {})",
                params.interval
            )));
        }

        Ok(GridSimulator {
            params,
            offset: Utc.fix(),
        })
    }

    /// Offset used for the formatted fill times
    pub fn with_display_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn params(&self) -> &RunParameters {
        &self.params
    }

    pub fn initial_state(&self) -> GridState {
        GridState::new(self.params.start_price)
    }

    /// Run the whole series and return the fills in creation order
    pub fn simulate(&self, candles: &[CandleBar]) -> Result<Vec<Position>> {
        if candles.is_empty() {
            return Err(GridError::invalid("candle series is empty"));
        }

        let state = candles
            .iter()
            .fold(self.initial_state(), |state, bar| self.step(state, bar));

        debug!(
            "Interval {}: {} fills, {} still open",
            self.params.interval,
            state.positions.len(),
            state.open_count
        );
        Ok(state.into_positions())
    }

    /// Advance the grid by one bar: all buys first, then sells and marks
    pub fn step(&self, mut state: GridState, bar: &CandleBar) -> GridState {
        self.buy_phase(&mut state, bar);
        self.sell_phase(&mut state, bar);
        state
    }

    fn buy_phase(&self, state: &mut GridState, bar: &CandleBar) {
        let p = &self.params;

        while bar.low < state.next_buy_price && state.open_count < p.position_count {
            // Opened inside the pending band: fill at the level already scheduled
            if bar.open <= state.next_buy_price && bar.open >= state.next_buy_price_backup {
                state.next_buy_price = state.next_buy_price_backup;
            }

            let price = state.next_buy_price;
            let rate = round2(p.position_amount / price);
            let profit = round2(rate * (bar.close - price));

            let buy = Fill::new(price, bar, self.offset);
            debug!(
                "{} BUY at {:.2}: rate={:.2}, open={}/{}",
                buy.time,
                price,
                rate,
                state.open_count + 1,
                p.position_count
            );

            state.positions.push(Position {
                meta: PositionMeta {
                    amount: p.position_amount,
                    rate,
                    profit,
                },
                buy,
                sell: None,
            });
            state.open_count += 1;

            state.next_buy_price -= p.interval;
            state.next_buy_price_backup = state.next_buy_price;
        }
    }

    fn sell_phase(&self, state: &mut GridState, bar: &CandleBar) {
        let p = &self.params;
        let GridState {
            next_buy_price,
            positions,
            open_count,
            ..
        } = state;

        for position in positions
            .iter_mut()
            .filter(|pos| pos.is_open() && pos.buy.timestamp != bar.start_time)
        {
            let sell_price = position.buy.price + p.interval * p.progress;

            if bar.high > sell_price {
                position.meta.profit = round2(position.meta.rate * p.interval * p.progress);
                let sell = Fill::new(sell_price, bar, self.offset);
                debug!(
                    "{} SELL at {:.2}: bought {:.2}, profit={:.2}",
                    sell.time, sell_price, position.buy.price, position.meta.profit
                );
                position.sell = Some(sell);
                *open_count -= 1;

                *next_buy_price = if p.strict {
                    position.buy.price
                } else {
                    sell_price - p.interval
                };
            } else {
                position.meta.profit =
                    round2(position.meta.rate * (bar.close - position.buy.price));
            }
        }

        trace!(
            "bar {} closed: next buy {:.2}, {} open",
            bar.start_time,
            next_buy_price,
            open_count
        );
    }
}

/// Convenience wrapper: one simulation with UTC fill times
pub fn simulate(candles: &[CandleBar], params: RunParameters) -> Result<Vec<Position>> {
    GridSimulator::new(params)?.simulate(candles)
}
