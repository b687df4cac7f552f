//! EvaluationScore: rubric result for one signal.

use super::ids::{ScoreId, SignalId};
use super::signal::Direction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound of each sub-score.
pub const SUB_SCORE_MAX: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScore {
    pub id: ScoreId,
    pub signal_id: SignalId,
    pub symbol: String,
    pub direction: Direction,
    pub confidence: f64,

    // ── Sub-scores, each in [0, 20] ──
    pub oscillator: f64,
    pub trend_confirmation: f64,
    pub trend_strength: f64,
    pub alignment: f64,
    pub momentum: f64,

    /// Clamped to [0, 100].
    pub total: f64,
    pub threshold: f64,
    pub passed: bool,

    /// Set once, after a confirmed notification send.
    pub delivered: bool,
    pub created_at: DateTime<Utc>,
}

impl EvaluationScore {
    /// Record a successful delivery. Returns false if already delivered.
    pub fn mark_delivered(&mut self) -> bool {
        if self.delivered {
            return false;
        }
        self.delivered = true;
        true
    }

    pub fn sub_score_sum(&self) -> f64 {
        self.oscillator + self.trend_confirmation + self.trend_strength + self.alignment + self.momentum
    }

    /// Passed, not HOLD, not yet sent.
    pub fn awaiting_delivery(&self) -> bool {
        self.passed && !self.delivered && self.direction != Direction::Hold
    }
}
