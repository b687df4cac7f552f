//! CandleBar: a single OHLCV bar keyed by UNIX seconds.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandleBar {
    /// UNIX timestamp in seconds.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl CandleBar {
    /// high ≥ max(open, close), low ≤ min(open, close), all prices positive.
    pub fn is_consistent(&self) -> bool {
        self.low > 0.0
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
    }
}

/// Close prices in bar order.
pub fn closes(bars: &[CandleBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistency_check() {
        let good = CandleBar {
            time: 0,
            open: 10.0,
            high: 11.0,
            low: 9.0,
            close: 10.5,
            volume: 1,
        };
        assert!(good.is_consistent());

        let bad = CandleBar { high: 10.2, ..good };
        assert!(!bad.is_consistent());
    }
}
