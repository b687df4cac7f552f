//! Simple Moving Average (SMA).
//!
//! Mean of the last `period` prices. With fewer than `period` points the
//! mean of everything available is returned instead.
//! Edge case: empty input → 0.

pub fn sma(prices: &[f64], period: usize) -> f64 {
    if prices.is_empty() {
        return 0.0;
    }
    let window = &prices[prices.len().saturating_sub(period.max(1))..];
    window.iter().sum::<f64>() / window.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_near, TIGHT};

    #[test]
    fn trailing_window() {
        assert_near(sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3), 4.0, TIGHT);
    }

    #[test]
    fn short_input_averages_everything() {
        assert_near(sma(&[2.0, 4.0, 9.0], 20), 5.0, TIGHT);
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(sma(&[], 5), 0.0);
    }
}
