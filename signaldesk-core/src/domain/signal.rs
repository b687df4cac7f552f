//! Signal: a directional call with confidence, target and stop.

use super::ids::SignalId;
use super::indicator_set::TechnicalIndicatorSet;
use super::market::Market;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
            Direction::Hold => "HOLD",
        }
    }

    /// +1 for BUY, −1 for SELL, 0 for HOLD.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
            Direction::Hold => 0.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub const HIGH_THRESHOLD: f64 = 75.0;
    pub const MEDIUM_THRESHOLD: f64 = 55.0;

    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= Self::HIGH_THRESHOLD {
            ConfidenceTier::High
        } else if confidence >= Self::MEDIUM_THRESHOLD {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

/// Whether the rationale text came from a language model or the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeSource {
    Provider,
    Fallback,
}

/// One analysis result. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub symbol: String,
    pub name: String,
    pub market: Market,
    pub direction: Direction,
    /// 0–100.
    pub confidence: f64,
    pub tier: ConfidenceTier,
    pub price: f64,
    pub target_price: f64,
    pub stop_loss: f64,
    pub reasoning: String,
    pub technical_summary: String,
    pub fundamental_summary: String,
    pub narrative_source: NarrativeSource,
    pub indicators: TechnicalIndicatorSet,
    pub timeframe: String,
    pub created_at: DateTime<Utc>,
}

impl Signal {
    /// Target and stop sit on the correct side of price for the direction.
    pub fn levels_are_ordered(&self) -> bool {
        match self.direction {
            Direction::Buy => self.target_price > self.price && self.price > self.stop_loss,
            Direction::Sell => self.stop_loss > self.price && self.price > self.target_price,
            Direction::Hold => true,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.direction != Direction::Hold
    }
}
