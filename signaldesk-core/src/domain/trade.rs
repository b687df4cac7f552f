//! Trade records produced by the automation pipeline.

use super::ids::{SignalId, TradeId, UserId};
use super::market::Market;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// +1 for BUY, −1 for SELL.
    pub fn sign(self) -> f64 {
        match self {
            TradeSide::Buy => 1.0,
            TradeSide::Sell => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Open,
    Closed,
}

/// A paper position opened against the simulated cash balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedTrade {
    pub id: TradeId,
    pub user_id: UserId,
    pub symbol: String,
    pub name: String,
    pub market: Market,
    pub side: TradeSide,
    pub quantity: f64,
    pub price: f64,
    /// price × quantity at entry.
    pub total: f64,
    pub status: TradeStatus,
    pub close_price: Option<f64>,
    pub pnl: Option<f64>,
    pub pnl_percent: Option<f64>,
    pub signal_id: Option<SignalId>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl SimulatedTrade {
    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// True when closed with positive PnL.
    pub fn is_winner(&self) -> bool {
        self.status == TradeStatus::Closed && self.pnl.unwrap_or(0.0) > 0.0
    }
}

/// Outcome recorded for a brokerage forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RealTradeStatus {
    /// Real trading disabled or no brokerage configured.
    Simulated,
    /// Status string reported by the broker (e.g. "accepted", "filled").
    Broker(String),
    Failed,
}

impl fmt::Display for RealTradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RealTradeStatus::Simulated => f.write_str("SIMULATED"),
            RealTradeStatus::Broker(s) => f.write_str(&s.to_ascii_uppercase()),
            RealTradeStatus::Failed => f.write_str("FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealTrade {
    pub id: TradeId,
    pub user_id: UserId,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: f64,
    pub price: f64,
    pub total: f64,
    pub broker_order_id: Option<String>,
    pub status: RealTradeStatus,
    pub signal_id: Option<SignalId>,
    pub created_at: DateTime<Utc>,
}
