//! MACD with a damped signal line.
//!
//! macd = EMA12 - EMA26, signal = macd * 0.9, histogram = macd - signal.
//! The signal line is not a 9-period EMA of the MACD series; it is a fixed
//! fraction of the current MACD value, so the histogram always has the
//! same sign as the MACD line.

use super::ema::ema;
use serde::{Deserialize, Serialize};

pub const FAST_PERIOD: usize = 12;
pub const SLOW_PERIOD: usize = 26;
pub const SIGNAL_DAMPING: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

pub fn macd(prices: &[f64]) -> Macd {
    let line = ema(prices, FAST_PERIOD) - ema(prices, SLOW_PERIOD);
    let signal = line * SIGNAL_DAMPING;
    Macd {
        macd: line,
        signal,
        histogram: line - signal,
    }
}
