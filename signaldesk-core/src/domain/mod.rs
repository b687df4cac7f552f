//! Domain types for SignalDesk.

pub mod candle;
pub mod ids;
pub mod indicator_set;
pub mod market;
pub mod quote;
pub mod score;
pub mod signal;
pub mod trade;

pub use candle::{closes, CandleBar};
pub use ids::{ScoreId, SignalId, TradeId, UserId};
pub use indicator_set::TechnicalIndicatorSet;
pub use market::{default_universe, Market, SymbolInfo};
pub use quote::{DataSource, Quote};
pub use score::EvaluationScore;
pub use signal::{ConfidenceTier, Direction, NarrativeSource, Signal};
pub use trade::{RealTrade, RealTradeStatus, SimulatedTrade, TradeSide, TradeStatus};

/// Symbol type alias
pub type Symbol = String;
