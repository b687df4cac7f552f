use serde::{Deserialize, Serialize};

/// Derived indicator values attached to a signal.
///
/// Either computed from price history or synthesized around the current
/// price when not enough history is available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicatorSet {
    /// 0–100.
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    /// macd − macd_signal.
    pub macd_histogram: f64,
    pub sma20: f64,
    pub sma50: f64,
    pub sma200: f64,
    pub ema20: f64,
    pub bollinger_upper: f64,
    pub bollinger_middle: f64,
    pub bollinger_lower: f64,
    /// 0–100.
    pub adx: f64,
    pub atr: f64,
    /// 0–100.
    pub stochastic: f64,
    pub momentum: f64,
}
