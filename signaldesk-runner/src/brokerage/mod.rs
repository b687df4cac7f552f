//! Brokerage collaborator.
//!
//! The pipeline only needs `place_order`; the rest backs the CLI's account
//! views. Broker payloads carry numbers either as JSON numbers or as decimal
//! strings, so numeric fields accept both.

pub mod alpaca;

pub use alpaca::AlpacaBrokerage;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use signaldesk_core::domain::TradeSide;

#[derive(Debug, thiserror::Error)]
pub enum BrokerageError {
    #[error("network error: {0}")]
    Network(String),

    #[error("broker returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("malformed broker response: {0}")]
    Malformed(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),
}

impl From<reqwest::Error> for BrokerageError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BrokerageError::Malformed(e.to_string())
        } else {
            BrokerageError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerageMode {
    #[default]
    Paper,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day,
    Gtc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub qty: f64,
    pub side: TradeSide,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    /// Required for limit orders, ignored otherwise.
    pub limit_price: Option<f64>,
}

impl OrderRequest {
    /// Market order, good for the day.
    pub fn market(symbol: impl Into<String>, qty: f64, side: TradeSide) -> Self {
        Self {
            symbol: symbol.into(),
            qty,
            side,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Day,
            limit_price: None,
        }
    }

    pub fn validate(&self) -> Result<(), BrokerageError> {
        if self.symbol.trim().is_empty() {
            return Err(BrokerageError::InvalidOrder("empty symbol".into()));
        }
        if !(self.qty.is_finite() && self.qty > 0.0) {
            return Err(BrokerageError::InvalidOrder(format!(
                "quantity must be positive, got {}",
                self.qty
            )));
        }
        if self.order_type == OrderType::Limit
            && !self.limit_price.is_some_and(|p| p.is_finite() && p > 0.0)
        {
            return Err(BrokerageError::InvalidOrder(
                "limit order needs a positive limit price".into(),
            ));
        }
        Ok(())
    }
}

// ── Broker payloads ──

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub client_order_id: String,
    pub symbol: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub qty: f64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub filled_qty: f64,
    pub side: String,
    #[serde(rename = "type", default)]
    pub order_type: String,
    #[serde(default)]
    pub time_in_force: String,
    pub status: String,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub filled_avg_price: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub filled_at: Option<String>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub account_number: String,
    pub status: String,
    #[serde(default)]
    pub currency: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub buying_power: f64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub cash: f64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub portfolio_value: f64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub equity: f64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub last_equity: f64,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub qty: f64,
    /// `long` or `short`.
    pub side: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub avg_entry_price: f64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub market_value: f64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub cost_basis: f64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub unrealized_pl: f64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub current_price: f64,
}

#[async_trait]
pub trait Brokerage: Send + Sync {
    fn name(&self) -> &str;

    async fn place_order(&self, order: &OrderRequest) -> Result<Order, BrokerageError>;

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerageError>;

    async fn account(&self) -> Result<Account, BrokerageError>;

    async fn positions(&self) -> Result<Vec<Position>, BrokerageError>;

    /// Orders still working at the broker, newest first.
    async fn open_orders(&self, limit: u32) -> Result<Vec<Order>, BrokerageError>;

    /// Liquidate the whole position in `symbol`.
    async fn close_position(&self, symbol: &str) -> Result<Order, BrokerageError>;
}
