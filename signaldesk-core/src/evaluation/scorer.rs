//! Evaluation scorer.
//!
//! Five sub-scores, each in [0, 20]:
//! - oscillator: RSI in the zone that confirms the direction
//! - trend confirmation: MACD line vs signal, +3 for a material histogram
//! - trend strength: step function of ADX, direction-independent
//! - alignment: price vs SMA20/50/200 (7/7/6)
//! - momentum: sign agreement, scaled by magnitude
//!
//! total = clamp(sum + (confidence − 50) / 50 · 5, 0, 100), passed = total ≥ threshold.
//! Scoring never delivers anything; `EvaluationScore::mark_delivered` is the
//! caller's job after a confirmed send.

use crate::domain::score::SUB_SCORE_MAX;
use crate::domain::{Direction, EvaluationScore, ScoreId, Signal, TechnicalIndicatorSet};
use chrono::Utc;

pub const DEFAULT_PASS_THRESHOLD: f64 = 75.0;

/// Histogram magnitude above which the MACD bonus applies.
const HISTOGRAM_MATERIALITY: f64 = 0.1;
const HISTOGRAM_BONUS: f64 = 3.0;

pub fn oscillator_score(direction: Direction, rsi: f64) -> f64 {
    match direction {
        Direction::Buy => {
            if rsi < 30.0 {
                20.0
            } else if rsi < 40.0 {
                15.0
            } else if rsi < 50.0 {
                10.0
            } else if rsi < 60.0 {
                5.0
            } else {
                0.0
            }
        }
        Direction::Sell => {
            if rsi > 70.0 {
                20.0
            } else if rsi > 60.0 {
                15.0
            } else if rsi > 50.0 {
                10.0
            } else if rsi > 40.0 {
                5.0
            } else {
                0.0
            }
        }
        Direction::Hold => {
            if rsi > 40.0 && rsi < 60.0 {
                15.0
            } else {
                5.0
            }
        }
    }
}

pub fn trend_confirmation_score(direction: Direction, ind: &TechnicalIndicatorSet) -> f64 {
    let bullish = ind.macd > ind.macd_signal;
    let base = match direction {
        Direction::Buy if bullish => 20.0,
        Direction::Sell if !bullish => 20.0,
        Direction::Hold => 10.0,
        _ => 5.0,
    };

    let hist = ind.macd_histogram;
    let agrees = match direction {
        Direction::Buy => hist > 0.0,
        Direction::Sell => hist < 0.0,
        Direction::Hold => false,
    };
    if hist.abs() > HISTOGRAM_MATERIALITY && agrees {
        (base + HISTOGRAM_BONUS).min(SUB_SCORE_MAX)
    } else {
        base
    }
}

pub fn trend_strength_score(adx: f64) -> f64 {
    if adx > 40.0 {
        20.0
    } else if adx > 30.0 {
        16.0
    } else if adx > 25.0 {
        12.0
    } else if adx > 20.0 {
        8.0
    } else {
        4.0
    }
}

pub fn alignment_score(direction: Direction, price: f64, ind: &TechnicalIndicatorSet) -> f64 {
    let shares = [(ind.sma20, 7.0), (ind.sma50, 7.0), (ind.sma200, 6.0)];
    match direction {
        Direction::Buy => shares
            .iter()
            .filter(|(sma, _)| price > *sma)
            .map(|(_, pts)| pts)
            .sum(),
        Direction::Sell => shares
            .iter()
            .filter(|(sma, _)| price <= *sma)
            .map(|(_, pts)| pts)
            .sum(),
        Direction::Hold => 10.0,
    }
}

pub fn momentum_score(direction: Direction, momentum: f64) -> f64 {
    let m = if momentum.is_finite() { momentum } else { 0.0 };
    let agrees = match direction {
        Direction::Buy => m > 0.0,
        Direction::Sell => m < 0.0,
        Direction::Hold => false,
    };
    if agrees {
        (10.0 + m.abs()).min(SUB_SCORE_MAX)
    } else {
        5.0
    }
}

pub fn evaluate(signal: &Signal, threshold: f64) -> EvaluationScore {
    let ind = &signal.indicators;
    let dir = signal.direction;

    let oscillator = oscillator_score(dir, ind.rsi);
    let trend_confirmation = trend_confirmation_score(dir, ind);
    let trend_strength = trend_strength_score(ind.adx);
    let alignment = alignment_score(dir, signal.price, ind);
    let momentum = momentum_score(dir, ind.momentum);

    let bonus = (signal.confidence - 50.0) / 50.0 * 5.0;
    let raw = oscillator + trend_confirmation + trend_strength + alignment + momentum + bonus;
    let total = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 100.0) };

    EvaluationScore {
        id: ScoreId::new(),
        signal_id: signal.id,
        symbol: signal.symbol.clone(),
        direction: dir,
        confidence: signal.confidence,
        oscillator,
        trend_confirmation,
        trend_strength,
        alignment,
        momentum,
        total,
        threshold,
        passed: total >= threshold,
        delivered: false,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ind() -> TechnicalIndicatorSet {
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
    fn oscillator_tiers() {
        assert_eq!(oscillator_score(Direction::Buy, 29.9), 20.0);
        assert_eq!(oscillator_score(Direction::Buy, 30.0), 15.0);
        assert_eq!(oscillator_score(Direction::Buy, 45.0), 10.0);
        assert_eq!(oscillator_score(Direction::Buy, 55.0), 5.0);
        assert_eq!(oscillator_score(Direction::Buy, 60.0), 0.0);
        assert_eq!(oscillator_score(Direction::Sell, 70.1), 20.0);
        assert_eq!(oscillator_score(Direction::Sell, 65.0), 15.0);
        assert_eq!(oscillator_score(Direction::Sell, 55.0), 10.0);
        assert_eq!(oscillator_score(Direction::Sell, 45.0), 5.0);
        assert_eq!(oscillator_score(Direction::Sell, 40.0), 0.0);
        assert_eq!(oscillator_score(Direction::Hold, 50.0), 15.0);
        assert_eq!(oscillator_score(Direction::Hold, 40.0), 5.0);
        assert_eq!(oscillator_score(Direction::Hold, 60.0), 5.0);
    }

    #[test]
    fn trend_confirmation_with_bonus() {
        let bull = TechnicalIndicatorSet {
            macd: 1.0,
            macd_signal: 0.9,
            macd_histogram: 0.1,
            ..ind()
        };
        // 0.1 is not material
        assert_eq!(trend_confirmation_score(Direction::Buy, &bull), 20.0);
        assert_eq!(trend_confirmation_score(Direction::Sell, &bull), 5.0);
        assert_eq!(trend_confirmation_score(Direction::Hold, &bull), 10.0);

        // Opposed line but material agreeing histogram → 5 + 3
        let odd = TechnicalIndicatorSet {
            macd: -1.0,
            macd_signal: -0.5,
            macd_histogram: 0.5,
            ..ind()
        };
        assert_eq!(trend_confirmation_score(Direction::Buy, &odd), 8.0);
    }

    #[test]
    fn adx_steps() {
        assert_eq!(trend_strength_score(45.0), 20.0);
        assert_eq!(trend_strength_score(40.0), 16.0);
        assert_eq!(trend_strength_score(30.0), 12.0);
        assert_eq!(trend_strength_score(25.0), 8.0);
        assert_eq!(trend_strength_score(20.0), 4.0);
    }

    #[test]
    fn alignment_shares() {
        let i = TechnicalIndicatorSet {
            sma20: 90.0,
            sma50: 110.0,
            sma200: 80.0,
            ..ind()
        };
        assert_eq!(alignment_score(Direction::Buy, 100.0, &i), 13.0);
        assert_eq!(alignment_score(Direction::Sell, 100.0, &i), 7.0);
        assert_eq!(alignment_score(Direction::Hold, 100.0, &i), 10.0);
    }

    #[test]
    fn momentum_agreement() {
        assert_eq!(momentum_score(Direction::Buy, 6.0), 16.0);
        assert_eq!(momentum_score(Direction::Buy, 15.0), 20.0);
        assert_eq!(momentum_score(Direction::Sell, -4.0), 14.0);
        assert_eq!(momentum_score(Direction::Sell, 4.0), 5.0);
        assert_eq!(momentum_score(Direction::Hold, 4.0), 5.0);
        assert_eq!(momentum_score(Direction::Buy, f64::NAN), 5.0);
    }
}
