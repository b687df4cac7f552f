//! Relative Strength Index (RSI).
//!
//! Simple averages of gains and losses over the first `period` deltas
//! (indexes 1..=period). No Wilder smoothing.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Edge cases: fewer than period+1 points → 50; avg_loss == 0 → 100.

/// Default lookback.
pub const RSI_PERIOD: usize = 14;

pub fn rsi(prices: &[f64], period: usize) -> f64 {
    let period = period.max(1);
    if prices.len() < period + 1 {
        return 50.0;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for w in prices[..=period].windows(2) {
        let change = w[1] - w[0];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}
