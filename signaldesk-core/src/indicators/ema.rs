//! Exponential Moving Average (EMA).
//!
//! Seeded with the first price, then folded forward:
//! EMA = price * k + EMA_prev * (1 - k), k = 2 / (period + 1).
//! Edge case: empty input → 0.

pub fn ema(prices: &[f64], period: usize) -> f64 {
    let Some((&first, rest)) = prices.split_first() else {
        return 0.0;
    };
    let k = 2.0 / (period as f64 + 1.0);
    rest.iter().fold(first, |prev, &p| p * k + prev * (1.0 - k))
}
