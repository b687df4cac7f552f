//! Indicator calculators over close-price series.
//!
//! Pure, synchronous functions. Each degrades to a neutral value on short
//! input instead of failing.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use ema::ema;
pub use macd::{macd, Macd};
pub use rsi::{rsi, RSI_PERIOD};
pub use sma::sma;

#[cfg(test)]
pub(crate) const TIGHT: f64 = 1e-10;

#[cfg(test)]
pub(crate) fn assert_near(got: f64, want: f64, tol: f64) {
    let gap = (got - want).abs();
    assert!(gap < tol, "got {got}, want {want} (off by {gap}, tolerance {tol})");
}
