//! Signal synthesizer.
//!
//! Builds an indicator set (computed from history when more than 14 closes
//! are available, synthesized around the price otherwise), votes a weighted
//! buy/sell score, and derives direction, confidence, target and stop.
//!
//! Votes (5 points possible):
//! - RSI < 30 → buy 1, > 70 → sell 1, < 45 → buy 0.5, > 55 → sell 0.5
//! - MACD above signal → buy 1, else sell 1
//! - price above SMA50 → buy 1, else sell 1
//! - ADX > 25: price above SMA20 → buy 0.5, else sell 0.5
//! - price below lower band → buy 1, above upper band → sell 1
//!
//! A side whose share of the 5 points exceeds 0.6 wins with confidence
//! 50 + ratio·50 (capped at 95). Otherwise HOLD with confidence in [40, 60).

use super::narrative::{
    build_prompt, fallback_narrative, parse_narrative, Narrative, NarrativeContext,
    NarrativeProvider,
};
use crate::domain::{
    ConfidenceTier, Direction, Market, NarrativeSource, Signal, SignalId, TechnicalIndicatorSet,
};
use crate::indicators::{ema, macd, rsi, sma, RSI_PERIOD};
use crate::rng::SeedSource;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;

/// History length above which indicators are computed instead of synthesized.
pub const HISTORY_THRESHOLD: usize = 14;
pub const TOTAL_WEIGHT: f64 = 5.0;
pub const DOMINANCE_RATIO: f64 = 0.6;
pub const MAX_CONFIDENCE: f64 = 95.0;

/// Accumulated buy/sell weight.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Votes {
    pub buy: f64,
    pub sell: f64,
}

pub fn vote(ind: &TechnicalIndicatorSet, price: f64) -> Votes {
    let mut v = Votes::default();

    if ind.rsi < 30.0 {
        v.buy += 1.0;
    } else if ind.rsi > 70.0 {
        v.sell += 1.0;
    } else if ind.rsi < 45.0 {
        v.buy += 0.5;
    } else if ind.rsi > 55.0 {
        v.sell += 0.5;
    }

    if ind.macd > ind.macd_signal {
        v.buy += 1.0;
    } else {
        v.sell += 1.0;
    }

    if price > ind.sma50 {
        v.buy += 1.0;
    } else {
        v.sell += 1.0;
    }

    if ind.adx > 25.0 {
        if price > ind.sma20 {
            v.buy += 0.5;
        } else {
            v.sell += 0.5;
        }
    }

    if price < ind.bollinger_lower {
        v.buy += 1.0;
    } else if price > ind.bollinger_upper {
        v.sell += 1.0;
    }

    v
}

/// Direction and confidence. `hold_jitter` in [0, 1) places a HOLD's
/// confidence inside [40, 60).
pub fn decide(ind: &TechnicalIndicatorSet, price: f64, hold_jitter: f64) -> (Direction, f64) {
    let votes = vote(ind, price);
    if votes.buy + votes.sell == 0.0 {
        return (Direction::Hold, 50.0);
    }

    let buy_ratio = votes.buy / TOTAL_WEIGHT;
    let sell_ratio = votes.sell / TOTAL_WEIGHT;
    let confidence = |ratio: f64| (50.0 + ratio * 50.0).min(MAX_CONFIDENCE);

    if buy_ratio > DOMINANCE_RATIO {
        (Direction::Buy, confidence(buy_ratio))
    } else if sell_ratio > DOMINANCE_RATIO {
        (Direction::Sell, confidence(sell_ratio))
    } else {
        (Direction::Hold, 40.0 + hold_jitter.clamp(0.0, 1.0) * 20.0)
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Target and stop from direction-dependent multipliers.
///
/// | dir  | target      | stop        |
/// |------|-------------|-------------|
/// | BUY  | ×1.05–1.15  | ×0.92–0.95  |
/// | SELL | ×0.90–0.95  | ×1.05–1.08  |
/// | HOLD | ×1.02–1.04  | ×0.97–0.98  |
///
/// Rounded to 4 decimals unless rounding would collapse a level onto price.
pub fn price_levels(direction: Direction, price: f64, r_target: f64, r_stop: f64) -> (f64, f64) {
    let (rt, rs) = (r_target.clamp(0.0, 1.0), r_stop.clamp(0.0, 1.0));
    let (target_mult, stop_mult) = match direction {
        Direction::Buy => (1.05 + rt * 0.10, 0.95 - rs * 0.03),
        Direction::Sell => (0.90 + rt * 0.05, 1.05 + rs * 0.03),
        Direction::Hold => (1.02 + rt * 0.02, 0.98 - rs * 0.01),
    };
    let raw = (price * target_mult, price * stop_mult);
    let rounded = (round4(raw.0), round4(raw.1));

    let ordered = |(t, s): (f64, f64)| match direction {
        Direction::Sell => s > price && price > t,
        _ => t > price && price > s,
    };
    if ordered(rounded) {
        rounded
    } else {
        raw
    }
}

/// Plausible indicator values anchored to `price`, reproducible per
/// `(symbol, price)`.
pub fn synthetic_indicators(seeds: &SeedSource, symbol: &str, price: f64) -> TechnicalIndicatorSet {
    let mut rng = seeds.rng_for(symbol, price, "indicators");
    let rsi = 30.0 + rng.gen::<f64>() * 50.0;
    let macd = (rng.gen::<f64>() - 0.5) * 2.0;
    let macd_signal = macd + (rng.gen::<f64>() - 0.5) * 0.5;
    let adx = 15.0 + rng.gen::<f64>() * 50.0;
    let sma20 = price * (0.95 + rng.gen::<f64>() * 0.10);
    let sma50 = price * (0.90 + rng.gen::<f64>() * 0.20);
    let sma200 = price * (0.85 + rng.gen::<f64>() * 0.30);
    let ema20 = price * (0.96 + rng.gen::<f64>() * 0.08);
    let bb_middle = price * (0.97 + rng.gen::<f64>() * 0.06);
    let bb_band = bb_middle * 0.02;
    let stochastic = 20.0 + rng.gen::<f64>() * 60.0;
    let momentum = (rng.gen::<f64>() - 0.5) * 10.0;

    TechnicalIndicatorSet {
        rsi,
        macd,
        macd_signal,
        macd_histogram: macd - macd_signal,
        sma20,
        sma50,
        sma200,
        ema20,
        bollinger_upper: bb_middle + bb_band,
        bollinger_middle: bb_middle,
        bollinger_lower: bb_middle - bb_band,
        adx,
        atr: price * 0.02,
        stochastic,
        momentum,
    }
}

/// Synthetic set, with the history-derived fields overwritten when
/// `history` has more than 14 closes.
pub fn indicators_for(
    seeds: &SeedSource,
    symbol: &str,
    price: f64,
    history: &[f64],
) -> TechnicalIndicatorSet {
    let mut ind = synthetic_indicators(seeds, symbol, price);
    if history.len() > HISTORY_THRESHOLD {
        let m = macd(history);
        ind.rsi = rsi(history, RSI_PERIOD);
        ind.macd = m.macd;
        ind.macd_signal = m.signal;
        ind.macd_histogram = m.histogram;
        ind.sma20 = sma(history, 20);
        ind.sma50 = sma(history, 50);
        ind.ema20 = ema(history, 20);
    }
    ind
}

pub struct SignalSynthesizer {
    seeds: SeedSource,
    narrative: Option<Arc<dyn NarrativeProvider>>,
}

impl SignalSynthesizer {
    pub fn new(seeds: SeedSource) -> Self {
        Self {
            seeds,
            narrative: None,
        }
    }

    pub fn with_narrative(mut self, provider: Arc<dyn NarrativeProvider>) -> Self {
        self.narrative = Some(provider);
        self
    }

    pub fn has_narrative(&self) -> bool {
        self.narrative.is_some()
    }

    pub async fn analyze(
        &self,
        symbol: &str,
        name: &str,
        market: Market,
        price: f64,
        history: &[f64],
    ) -> Signal {
        let indicators = indicators_for(&self.seeds, symbol, price, history);
        let mut rng = self.seeds.rng_for(symbol, price, "decision");
        let (mut direction, mut confidence) = decide(&indicators, price, rng.gen());
        if !(price.is_finite() && price > 0.0) {
            tracing::warn!(symbol, price, "unusable price, forcing HOLD");
            direction = Direction::Hold;
            confidence = 0.0;
        }
        let (target_price, stop_loss) = price_levels(direction, price, rng.gen(), rng.gen());

        let ctx = NarrativeContext {
            symbol,
            name,
            market,
            price,
            direction,
            target_price,
            stop_loss,
            indicators: &indicators,
        };
        let (narrative, narrative_source) = self.narrate(&ctx).await;

        tracing::debug!(symbol, %direction, confidence, "signal synthesized");

        Signal {
            id: SignalId::new(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            market,
            direction,
            confidence,
            tier: ConfidenceTier::from_confidence(confidence),
            price,
            target_price,
            stop_loss,
            reasoning: narrative.reasoning,
            technical_summary: narrative.technical,
            fundamental_summary: narrative.fundamental,
            narrative_source,
            indicators,
            timeframe: "1D".to_string(),
            created_at: Utc::now(),
        }
    }

    async fn narrate(&self, ctx: &NarrativeContext<'_>) -> (Narrative, NarrativeSource) {
        if let Some(provider) = &self.narrative {
            match provider.complete(&build_prompt(ctx)).await {
                Ok(reply) => match parse_narrative(&reply) {
                    Some(n) => return (n, NarrativeSource::Provider),
                    None => tracing::warn!(
                        symbol = ctx.symbol,
                        provider = provider.name(),
                        "completion missing labeled lines, using template"
                    ),
                },
                Err(e) => tracing::warn!(
                    symbol = ctx.symbol,
                    provider = provider.name(),
                    error = %e,
                    "narrative provider failed, using template"
                ),
            }
        }
        (fallback_narrative(ctx), NarrativeSource::Fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::narrative::NarrativeError;
    use async_trait::async_trait;

    fn neutral() -> TechnicalIndicatorSet {
        TechnicalIndicatorSet {
            rsi: 50.0,
            macd: 0.0,
            macd_signal: 0.0,
            macd_histogram: 0.0,
            sma20: 100.0,
            sma50: 100.0,
            sma200: 100.0,
            ema20: 100.0,
            bollinger_upper: 102.0,
            bollinger_middle: 100.0,
            bollinger_lower: 98.0,
            adx: 20.0,
            atr: 2.0,
            stochastic: 50.0,
            momentum: 0.0,
        }
    }

    #[test]
    fn strong_buy_votes() {
        let ind = TechnicalIndicatorSet {
            rsi: 25.0,
            macd: 1.0,
            macd_signal: 0.5,
            sma50: 90.0,
            sma20: 95.0,
            adx: 30.0,
            bollinger_lower: 101.0,
            bollinger_upper: 110.0,
            ..neutral()
        };
        let v = vote(&ind, 100.0);
        assert_eq!(v, Votes { buy: 4.5, sell: 0.0 });
        let (dir, conf) = decide(&ind, 100.0, 0.0);
        assert_eq!(dir, Direction::Buy);
        assert!((conf - 95.0).abs() < 1e-9);
    }

    #[test]
    fn strong_sell_votes() {
        let ind = TechnicalIndicatorSet {
            rsi: 75.0,
            macd: -1.0,
            macd_signal: -0.5,
            sma50: 110.0,
            bollinger_upper: 99.0,
            ..neutral()
        };
        let (dir, conf) = decide(&ind, 100.0, 0.0);
        assert_eq!(dir, Direction::Sell);
        assert!((conf - 90.0).abs() < 1e-9);
    }

    #[test]
    fn mixed_votes_hold_in_mid_band() {
        // macd == signal → sell 1; price == sma50 → sell 1; rsi 50 → none
        let (dir, conf) = decide(&neutral(), 100.0, 0.5);
        assert_eq!(dir, Direction::Hold);
        assert!((40.0..60.0).contains(&conf));
        assert_eq!(conf, 50.0);
    }

    #[test]
    fn ratio_must_exceed_threshold() {
        // buy = 3.0 exactly → ratio 0.6, not > 0.6
        let ind = TechnicalIndicatorSet {
            rsi: 25.0,
            macd: 1.0,
            macd_signal: 0.5,
            sma50: 90.0,
            ..neutral()
        };
        assert_eq!(vote(&ind, 100.0).buy, 3.0);
        assert_eq!(decide(&ind, 100.0, 0.0).0, Direction::Hold);
    }

    #[test]
    fn levels_keep_ordering() {
        for &(r1, r2) in &[(0.0, 0.0), (0.5, 0.5), (0.999, 0.999)] {
            let (t, s) = price_levels(Direction::Buy, 100.0, r1, r2);
            assert!(t > 100.0 && 100.0 > s);
            let (t, s) = price_levels(Direction::Sell, 100.0, r1, r2);
            assert!(s > 100.0 && 100.0 > t);
            let (t, s) = price_levels(Direction::Hold, 100.0, r1, r2);
            assert!(t > 100.0 && 100.0 > s);
        }
    }

    #[test]
    fn tiny_prices_skip_rounding() {
        let (t, s) = price_levels(Direction::Buy, 0.00001, 0.0, 0.0);
        assert!(t > 0.00001 && 0.00001 > s);
    }

    #[test]
    fn synthetic_indicators_are_reproducible_and_anchored() {
        let seeds = SeedSource::new(1);
        let a = synthetic_indicators(&seeds, "AAPL", 200.0);
        let b = synthetic_indicators(&seeds, "AAPL", 200.0);
        assert_eq!(a, b);
        assert!((30.0..80.0).contains(&a.rsi));
        assert!((190.0..=210.0).contains(&a.sma20));
        assert!(a.bollinger_upper > a.bollinger_lower);
        assert!((a.macd_histogram - (a.macd - a.macd_signal)).abs() < 1e-12);
    }

    #[test]
    fn long_history_overrides_computed_fields() {
        let seeds = SeedSource::new(1);
        let history: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let ind = indicators_for(&seeds, "AAPL", 129.0, &history);
        assert_eq!(ind.rsi, 100.0);
        assert_eq!(ind.sma20, sma(&history, 20));
        assert_eq!(ind.ema20, ema(&history, 20));

        let short = indicators_for(&seeds, "AAPL", 129.0, &history[..14]);
        assert_eq!(short, synthetic_indicators(&seeds, "AAPL", 129.0));
    }

    struct Scripted(Result<&'static str, ()>);

    #[async_trait]
    impl NarrativeProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, NarrativeError> {
            self.0
                .map(str::to_string)
                .map_err(|_| NarrativeError::Network("down".into()))
        }
    }

    #[tokio::test]
    async fn provider_reply_is_used() {
        let synth = SignalSynthesizer::new(SeedSource::default()).with_narrative(Arc::new(
            Scripted(Ok("reason: r\ntechnical: t\nfundamental: f")),
        ));
        let s = synth.analyze("AAPL", "Apple", Market::Us, 190.0, &[]).await;
        assert_eq!(s.narrative_source, NarrativeSource::Provider);
        assert_eq!(s.reasoning, "r");
        assert_eq!(s.fundamental_summary, "f");
    }

    #[tokio::test]
    async fn provider_failure_falls_back() {
        let synth = SignalSynthesizer::new(SeedSource::default())
            .with_narrative(Arc::new(Scripted(Err(()))));
        let s = synth.analyze("AAPL", "Apple", Market::Us, 190.0, &[]).await;
        assert_eq!(s.narrative_source, NarrativeSource::Fallback);
        assert!(!s.reasoning.is_empty());
    }

    #[tokio::test]
    async fn analysis_is_reproducible_and_ordered() {
        let synth = SignalSynthesizer::new(SeedSource::new(9));
        let a = synth.analyze("MSFT", "Microsoft", Market::Us, 410.0, &[]).await;
        let b = synth.analyze("MSFT", "Microsoft", Market::Us, 410.0, &[]).await;
        assert_eq!(a.direction, b.direction);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.target_price, b.target_price);
        assert!(a.levels_are_ordered());
        assert_eq!(a.tier, ConfidenceTier::from_confidence(a.confidence));
        assert_eq!(a.timeframe, "1D");
    }
}
