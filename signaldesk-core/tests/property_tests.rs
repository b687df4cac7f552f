//! Property tests for indicator, mock-data and scoring invariants.
//!
//! Uses proptest to verify:
//! 1. RSI stays in [0, 100] and is neutral on short input
//! 2. SMA of a short series is the plain mean
//! 3. Mock prices are deterministic and mock candles are well-formed
//! 4. Scores are clamped and `passed` tracks the threshold
//! 5. Target/stop levels sit on the correct side of price

use chrono::Utc;
use proptest::prelude::*;
use signaldesk_core::analysis::price_levels;
use signaldesk_core::data::{mock_candles, mock_price};
use signaldesk_core::domain::{
    ConfidenceTier, Direction, Market, NarrativeSource, Signal, SignalId, TechnicalIndicatorSet,
};
use signaldesk_core::evaluation::evaluate;
use signaldesk_core::indicators::{rsi, sma};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_prices(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..1_000.0_f64, 0..max_len)
}

fn arb_market() -> impl Strategy<Value = Market> {
    prop_oneof![
        Just(Market::Us),
        Just(Market::Tr),
        Just(Market::Crypto),
        Just(Market::Commodity),
        Just(Market::Index),
    ]
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Buy), Just(Direction::Sell), Just(Direction::Hold)]
}

fn arb_symbol() -> impl Strategy<Value = String> {
    "[A-Z]{1,5}(/USD)?"
}

fn arb_indicators() -> impl Strategy<Value = TechnicalIndicatorSet> {
    (
        0.0..100.0_f64,
        -5.0..5.0_f64,
        -5.0..5.0_f64,
        (50.0..150.0_f64, 50.0..150.0_f64, 50.0..150.0_f64),
        0.0..100.0_f64,
        -60.0..60.0_f64,
    )
        .prop_map(|(rsi, macd, macd_signal, (sma20, sma50, sma200), adx, momentum)| {
            TechnicalIndicatorSet {
                rsi,
                macd,
                macd_signal,
                macd_histogram: macd - macd_signal,
                sma20,
                sma50,
                sma200,
                ema20: sma20,
                bollinger_upper: 102.0,
                bollinger_middle: 100.0,
                bollinger_lower: 98.0,
                adx,
                atr: 2.0,
                stochastic: 50.0,
                momentum,
            }
        })
}

fn signal(direction: Direction, confidence: f64, indicators: TechnicalIndicatorSet) -> Signal {
    Signal {
        id: SignalId::new(),
        symbol: "PROP".into(),
        name: "Property".into(),
        market: Market::Us,
        direction,
        confidence,
        tier: ConfidenceTier::from_confidence(confidence),
        price: 100.0,
        target_price: 110.0,
        stop_loss: 90.0,
        reasoning: String::new(),
        technical_summary: String::new(),
        fundamental_summary: String::new(),
        narrative_source: NarrativeSource::Fallback,
        indicators,
        timeframe: "1D".into(),
        created_at: Utc::now(),
    }
}

// ── 1. RSI ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_is_bounded(prices in arb_prices(80), period in 1usize..30) {
        let v = rsi(&prices, period);
        prop_assert!((0.0..=100.0).contains(&v), "rsi={}", v);
        if prices.len() < period + 1 {
            prop_assert_eq!(v, 50.0);
        }
    }

    #[test]
    fn rsi_without_losses_is_100(start in 1.0..100.0_f64, steps in prop::collection::vec(0.01..5.0_f64, 14..40)) {
        let mut prices = vec![start];
        for s in steps {
            let last = *prices.last().unwrap();
            prices.push(last + s);
        }
        prop_assert_eq!(rsi(&prices, 14), 100.0);
    }
}

// ── 2. SMA ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn sma_of_short_series_is_mean(prices in prop::collection::vec(1.0..1_000.0_f64, 1..20)) {
        let mean = prices.iter().sum::<f64>() / prices.len() as f64;
        prop_assert!((sma(&prices, 20) - mean).abs() < 1e-9);
    }
}

// ── 3. Mock data ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn mock_price_is_deterministic_and_positive(symbol in arb_symbol(), market in arb_market()) {
        let a = mock_price(&symbol, market);
        prop_assert_eq!(a, mock_price(&symbol, market));
        prop_assert!(a > 0.0);
    }

    #[test]
    fn mock_candles_are_well_formed(
        symbol in arb_symbol(),
        market in arb_market(),
        count in 0usize..200,
        step in 60i64..86_400,
    ) {
        let bars = mock_candles(&symbol, market, count, step, 1_700_000_000);
        prop_assert_eq!(bars.len(), count);
        for b in &bars {
            prop_assert!(b.high >= b.open.max(b.close));
            prop_assert!(b.low <= b.open.min(b.close));
            prop_assert!(b.low > 0.0);
        }
        for w in bars.windows(2) {
            prop_assert!(w[1].time > w[0].time);
        }
    }
}

// ── 4. Scoring ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn score_is_clamped_and_pass_tracks_threshold(
        direction in arb_direction(),
        confidence in 0.0..100.0_f64,
        indicators in arb_indicators(),
        threshold in 0.0..100.0_f64,
    ) {
        let score = evaluate(&signal(direction, confidence, indicators), threshold);
        prop_assert!((0.0..=100.0).contains(&score.total));
        prop_assert_eq!(score.passed, score.total >= threshold);
        for sub in [score.oscillator, score.trend_confirmation, score.trend_strength, score.alignment, score.momentum] {
            prop_assert!((0.0..=20.0).contains(&sub));
        }
        prop_assert!(!score.delivered);
    }
}

// ── 5. Target / stop ordering ────────────────────────────────────────

proptest! {
    #[test]
    fn levels_respect_direction(
        price in 0.0001..100_000.0_f64,
        r1 in 0.0..1.0_f64,
        r2 in 0.0..1.0_f64,
    ) {
        let (t, s) = price_levels(Direction::Buy, price, r1, r2);
        prop_assert!(t > price && price > s, "BUY t={} p={} s={}", t, price, s);
        let (t, s) = price_levels(Direction::Sell, price, r1, r2);
        prop_assert!(s > price && price > t, "SELL t={} p={} s={}", t, price, s);
    }
}
