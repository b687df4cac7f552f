//! Pipeline progress reporting.
//!
//! Callbacks are informational only; nothing they do can change a run.

use signaldesk_core::domain::{EvaluationScore, RealTrade, Signal, SimulatedTrade};

pub trait PipelineProgress: Send + Sync {
    /// Checkpoint reached; `percent` is in [0, 100].
    fn on_progress(&self, message: &str, percent: f64);

    fn on_signal(&self, _signal: &Signal) {}

    fn on_score(&self, _score: &EvaluationScore) {}

    /// A simulated trade opened; `cash` is the balance after it.
    fn on_simulated_trade(&self, _trade: &SimulatedTrade, _cash: f64) {}

    fn on_real_trade(&self, _trade: &RealTrade) {}
}

/// Discards everything.
pub struct NoProgress;

impl PipelineProgress for NoProgress {
    fn on_progress(&self, _message: &str, _percent: f64) {}
}

/// Emits checkpoints and outcomes as `tracing` events.
pub struct LogProgress;

impl PipelineProgress for LogProgress {
    fn on_progress(&self, message: &str, percent: f64) {
        tracing::info!(percent = percent.round(), "{message}");
    }

    fn on_signal(&self, signal: &Signal) {
        tracing::debug!(
            symbol = %signal.symbol,
            direction = %signal.direction,
            confidence = signal.confidence,
            "signal"
        );
    }

    fn on_score(&self, score: &EvaluationScore) {
        tracing::debug!(
            symbol = %score.symbol,
            total = score.total,
            passed = score.passed,
            "score"
        );
    }

    fn on_simulated_trade(&self, trade: &SimulatedTrade, cash: f64) {
        tracing::info!(
            symbol = %trade.symbol,
            side = %trade.side,
            quantity = trade.quantity,
            total = trade.total,
            cash,
            "simulated trade opened"
        );
    }

    fn on_real_trade(&self, trade: &RealTrade) {
        tracing::info!(symbol = %trade.symbol, status = %trade.status, "real trade recorded");
    }
}
