//! Paper-trading book-keeping.
//!
//! Cash moves twice per trade:
//! - open: BUY debits `total`, SELL credits `total`
//! - close: BUY credits `close · qty`, SELL credits `total − close · qty`
//!
//! pnl = (close − entry) · qty · (+1 BUY | −1 SELL), pnl% = pnl / total · 100.
//! Cash is never stored; `cash_balance` replays it from the trade list.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signaldesk_core::domain::{
    Direction, Signal, SimulatedTrade, TradeId, TradeSide, TradeStatus, UserId,
};

/// Simulator starting capital.
pub const INITIAL_CAPITAL: f64 = 100_000.0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SimulatorError {
    #[error("trade {0} is already closed")]
    AlreadyClosed(TradeId),

    #[error("invalid close price {0}")]
    InvalidPrice(f64),
}

/// Trade side for an actionable signal; HOLD has none.
pub fn side_for(direction: Direction) -> Option<TradeSide> {
    match direction {
        Direction::Buy => Some(TradeSide::Buy),
        Direction::Sell => Some(TradeSide::Sell),
        Direction::Hold => None,
    }
}

/// Whole units affordable with `max_position_percent` of `cash`.
///
/// The percentage is clamped to [1, 100]. Zero means "skip".
pub fn position_size(cash: f64, max_position_percent: f64, price: f64) -> f64 {
    if !(price.is_finite() && price > 0.0) || !(cash.is_finite() && cash > 0.0) {
        return 0.0;
    }
    let pct = if max_position_percent.is_nan() {
        1.0
    } else {
        max_position_percent.clamp(1.0, 100.0)
    };
    let budget = (cash * pct / 100.0).min(cash);
    (budget / price).floor()
}

/// New OPEN trade for `signal`. `None` for HOLD signals.
pub fn open_trade(signal: &Signal, quantity: f64, user: &UserId) -> Option<SimulatedTrade> {
    let side = side_for(signal.direction)?;
    Some(SimulatedTrade {
        id: TradeId::new(),
        user_id: user.clone(),
        symbol: signal.symbol.clone(),
        name: signal.name.clone(),
        market: signal.market,
        side,
        quantity,
        price: signal.price,
        total: quantity * signal.price,
        status: TradeStatus::Open,
        close_price: None,
        pnl: None,
        pnl_percent: None,
        signal_id: Some(signal.id),
        created_at: Utc::now(),
        closed_at: None,
    })
}

/// Cash change when `trade` is opened.
pub fn open_cash_delta(trade: &SimulatedTrade) -> f64 {
    match trade.side {
        TradeSide::Buy => -trade.total,
        TradeSide::Sell => trade.total,
    }
}

/// Cash change when `trade` is closed at `close_price`.
pub fn close_cash_delta(trade: &SimulatedTrade, close_price: f64) -> f64 {
    let proceeds = close_price * trade.quantity;
    match trade.side {
        TradeSide::Buy => proceeds,
        TradeSide::Sell => trade.total - proceeds,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub trade: SimulatedTrade,
    pub cash_delta: f64,
}

/// Close an open trade at `close_price`.
pub fn close_trade(
    trade: &SimulatedTrade,
    close_price: f64,
    now: DateTime<Utc>,
) -> Result<ClosedTrade, SimulatorError> {
    if !trade.is_open() {
        return Err(SimulatorError::AlreadyClosed(trade.id));
    }
    if !(close_price.is_finite() && close_price > 0.0) {
        return Err(SimulatorError::InvalidPrice(close_price));
    }

    let pnl = (close_price - trade.price) * trade.quantity * trade.side.sign();
    let pnl_percent = if trade.total != 0.0 {
        pnl / trade.total * 100.0
    } else {
        0.0
    };

    let mut closed = trade.clone();
    closed.status = TradeStatus::Closed;
    closed.close_price = Some(close_price);
    closed.pnl = Some(pnl);
    closed.pnl_percent = Some(pnl_percent);
    closed.closed_at = Some(now);

    Ok(ClosedTrade {
        cash_delta: close_cash_delta(trade, close_price),
        trade: closed,
    })
}

/// Cash after replaying every open and close in `trades` from `initial`.
pub fn cash_balance(initial: f64, trades: &[SimulatedTrade]) -> f64 {
    trades.iter().fold(initial, |cash, t| {
        let opened = cash + open_cash_delta(t);
        match (t.status, t.close_price) {
            (TradeStatus::Closed, Some(close)) => opened + close_cash_delta(t, close),
            _ => opened,
        }
    })
}

/// Symbols with at least one OPEN trade.
pub fn open_symbols(trades: &[SimulatedTrade]) -> HashSet<String> {
    trades
        .iter()
        .filter(|t| t.is_open())
        .map(|t| t.symbol.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub cash: f64,
    /// Σ totals of OPEN trades.
    pub invested: f64,
    /// cash + invested.
    pub value: f64,
    pub initial_capital: f64,
    pub total_return: f64,
    pub total_return_percent: f64,
    pub realized_pnl: f64,
    pub open_positions: usize,
    pub closed_trades: usize,
    /// Percent of closed trades with positive pnl; 0 with none closed.
    pub win_rate: f64,
}

impl PortfolioSummary {
    pub fn compute(cash: f64, trades: &[SimulatedTrade], initial_capital: f64) -> Self {
        let open: Vec<&SimulatedTrade> = trades.iter().filter(|t| t.is_open()).collect();
        let closed: Vec<&SimulatedTrade> = trades
            .iter()
            .filter(|t| t.status == TradeStatus::Closed)
            .collect();

        let invested: f64 = open.iter().map(|t| t.total).sum();
        let value = cash + invested;
        let total_return = value - initial_capital;
        let total_return_percent = if initial_capital > 0.0 {
            total_return / initial_capital * 100.0
        } else {
            0.0
        };
        let realized_pnl = closed.iter().filter_map(|t| t.pnl).sum();
        let winners = closed.iter().filter(|t| t.is_winner()).count();
        let win_rate = if closed.is_empty() {
            0.0
        } else {
            winners as f64 / closed.len() as f64 * 100.0
        };

        Self {
            cash,
            invested,
            value,
            initial_capital,
            total_return,
            total_return_percent,
            realized_pnl,
            open_positions: open.len(),
            closed_trades: closed.len(),
            win_rate,
        }
    }
}
