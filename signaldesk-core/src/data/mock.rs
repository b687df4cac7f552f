//! Deterministic mock market data.
//!
//! Seed: sum of the symbol's character codes, stepped through a small LCG
//! (`next = (s·9301 + 49297) mod 233280`, `r = next / 233280`). The first
//! draw picks a price inside the market's band, the second draws a ±3% daily
//! change, the third a volume. Candle series keep walking the same LCG with
//! symmetric ±1.5% steps.
//!
//! Nothing here can fail: this is the fallback of last resort.

use crate::domain::{CandleBar, DataSource, Market, Quote, SymbolInfo};

const LCG_MUL: u64 = 9301;
const LCG_INC: u64 = 49297;
const LCG_MOD: u64 = 233_280;

/// The classic 9301/49297/233280 linear congruential generator.
#[derive(Debug, Clone)]
struct Lcg {
    state: u64,
}

impl Lcg {
    fn for_symbol(symbol: &str) -> Self {
        Self {
            state: symbol_seed(symbol),
        }
    }

    /// Next value in [0, 1).
    fn next_unit(&mut self) -> f64 {
        self.state = (self.state % LCG_MOD * LCG_MUL + LCG_INC) % LCG_MOD;
        self.state as f64 / LCG_MOD as f64
    }
}

/// Sum of the symbol's character codes.
pub fn symbol_seed(symbol: &str) -> u64 {
    symbol.chars().map(|c| c as u64).sum()
}

fn price_in_band(symbol: &str, market: Market, r: f64) -> f64 {
    let upper = symbol.to_ascii_uppercase();
    let price = match market {
        Market::Us => 30.0 + r * 500.0,
        Market::Tr => 10.0 + r * 490.0,
        Market::Crypto if upper.starts_with("BTC") => 60_000.0 + r * 40_000.0,
        Market::Crypto if upper.starts_with("ETH") => 2_000.0 + r * 2_000.0,
        Market::Crypto => 0.5 + r * 499.5,
        Market::Commodity if upper.starts_with("XAU") => 2_000.0 + r * 1_200.0,
        Market::Commodity => 20.0 + r * 180.0,
        Market::Index => 1_000.0 + r * 39_000.0,
    };
    round_price(price)
}

fn round_price(price: f64) -> f64 {
    if price < 10.0 {
        (price * 10_000.0).round() / 10_000.0
    } else {
        (price * 100.0).round() / 100.0
    }
}

/// Stable pseudo-price for a symbol.
pub fn mock_price(symbol: &str, market: Market) -> f64 {
    let mut lcg = Lcg::for_symbol(symbol);
    price_in_band(symbol, market, lcg.next_unit())
}

/// Full mock quote carrying the caller's metadata.
pub fn mock_quote(info: &SymbolInfo) -> Quote {
    let mut lcg = Lcg::for_symbol(&info.symbol);
    let price = price_in_band(&info.symbol, info.market, lcg.next_unit());
    let change_percent = ((lcg.next_unit() - 0.5) * 6.0 * 100.0).round() / 100.0;
    let change = round_price(price * change_percent / 100.0);
    let volume = 1_000_000 + (lcg.next_unit() * 49_000_000.0) as u64;
    Quote::from_info(info, price, change, change_percent, volume, DataSource::Mock)
}

/// `count` bars spaced `interval_secs` apart, the last one stamped `end_time`.
///
/// Bars are oldest-first and always satisfy the OHLC invariant.
pub fn mock_candles(
    symbol: &str,
    market: Market,
    count: usize,
    interval_secs: i64,
    end_time: i64,
) -> Vec<CandleBar> {
    let step = interval_secs.max(1);
    let mut lcg = Lcg::for_symbol(symbol);
    let mut price = price_in_band(symbol, market, lcg.next_unit());
    let mut bars = Vec::with_capacity(count);

    for i in 0..count {
        let change = (lcg.next_unit() - 0.5) * 0.03;
        let open = price;
        let close = open * (1.0 + change);
        let high = open.max(close) * (1.0 + lcg.next_unit() * 0.01);
        let low = open.min(close) * (1.0 - lcg.next_unit() * 0.01);
        let volume = 100_000 + (lcg.next_unit() * 9_900_000.0) as u64;
        let offset = (count - 1 - i) as i64;

        bars.push(CandleBar {
            time: end_time - offset * step,
            open,
            high,
            low,
            close,
            volume,
        });
        price = close;
    }

    bars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_seed_sums_char_codes() {
        assert_eq!(symbol_seed("AB"), 65 + 66);
        assert_eq!(symbol_seed(""), 0);
    }

    #[test]
    fn price_is_deterministic() {
        assert_eq!(mock_price("AAPL", Market::Us), mock_price("AAPL", Market::Us));
    }

    #[test]
    fn prices_fall_in_market_bands() {
        let p = mock_price("AAPL", Market::Us);
        assert!((30.0..=530.0).contains(&p), "{p}");
        let p = mock_price("THYAO", Market::Tr);
        assert!((10.0..=500.0).contains(&p), "{p}");
        let p = mock_price("BTC/USD", Market::Crypto);
        assert!((60_000.0..=100_000.0).contains(&p), "{p}");
        let p = mock_price("ETH/USD", Market::Crypto);
        assert!((2_000.0..=4_000.0).contains(&p), "{p}");
        let p = mock_price("XAU/USD", Market::Commodity);
        assert!((2_000.0..=3_200.0).contains(&p), "{p}");
        let p = mock_price("SPX", Market::Index);
        assert!((1_000.0..=40_000.0).contains(&p), "{p}");
    }

    #[test]
    fn quote_carries_metadata_and_bounded_change() {
        let info = SymbolInfo::new("GARAN", "Garanti BBVA", Market::Tr);
        let q = mock_quote(&info);
        assert_eq!(q.symbol, "GARAN");
        assert_eq!(q.currency, "TRY");
        assert_eq!(q.source, DataSource::Mock);
        assert_eq!(q.price, mock_price("GARAN", Market::Tr));
        assert!(q.change_percent.abs() <= 3.0);
        assert!(q.volume >= 1_000_000 && q.volume <= 50_000_000);
    }

    #[test]
    fn candles_are_ordered_and_consistent() {
        let bars = mock_candles("NVDA", Market::Us, 90, 86_400, 1_700_000_000);
        assert_eq!(bars.len(), 90);
        assert_eq!(bars.last().unwrap().time, 1_700_000_000);
        for w in bars.windows(2) {
            assert!(w[1].time > w[0].time);
            assert_eq!(w[1].open, w[0].close);
        }
        assert!(bars.iter().all(CandleBar::is_consistent));
    }

    #[test]
    fn zero_candles_is_empty() {
        assert!(mock_candles("NVDA", Market::Us, 0, 60, 0).is_empty());
    }
}
