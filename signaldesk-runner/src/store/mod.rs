//! Record persistence.
//!
//! Everything is keyed by an opaque user id. Saves upsert by record id, so a
//! read always returns the latest write. Both stores keep one `UserLedger`
//! per user and share its logic; they differ only in where the ledger lives.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signaldesk_core::domain::{
    EvaluationScore, Market, RealTrade, ScoreId, Signal, SimulatedTrade, SymbolInfo, UserId,
};
use uuid::Uuid;

use crate::config::PipelineSettings;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt ledger {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub symbol: String,
    pub name: String,
    pub market: Market,
    pub added_at: DateTime<Utc>,
}

impl WatchlistEntry {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, market: Market) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            market,
            added_at: Utc::now(),
        }
    }

    pub fn to_symbol_info(&self) -> SymbolInfo {
        SymbolInfo::new(&self.symbol, &self.name, self.market)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogStatus {
    Success,
    Info,
    Failed,
}

/// Audit trail row written by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemLogEntry {
    pub id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub status: LogStatus,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl SystemLogEntry {
    pub fn new(
        action: &str,
        entity_type: &str,
        entity_id: Option<String>,
        status: LogStatus,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            status,
            payload,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn save_signal(&self, user: &UserId, signal: &Signal) -> Result<(), StoreError>;
    async fn signals(&self, user: &UserId) -> Result<Vec<Signal>, StoreError>;

    async fn save_score(&self, user: &UserId, score: &EvaluationScore) -> Result<(), StoreError>;
    async fn scores(&self, user: &UserId) -> Result<Vec<EvaluationScore>, StoreError>;
    /// Returns false if the score was already delivered.
    async fn mark_score_delivered(&self, user: &UserId, id: ScoreId) -> Result<bool, StoreError>;

    async fn save_simulated_trade(
        &self,
        user: &UserId,
        trade: &SimulatedTrade,
    ) -> Result<(), StoreError>;
    /// Replace an existing trade; `NotFound` if its id was never saved.
    async fn update_simulated_trade(
        &self,
        user: &UserId,
        trade: &SimulatedTrade,
    ) -> Result<(), StoreError>;
    async fn simulated_trades(&self, user: &UserId) -> Result<Vec<SimulatedTrade>, StoreError>;

    async fn save_real_trade(&self, user: &UserId, trade: &RealTrade) -> Result<(), StoreError>;
    async fn real_trades(&self, user: &UserId) -> Result<Vec<RealTrade>, StoreError>;

    async fn watchlist(&self, user: &UserId) -> Result<Vec<WatchlistEntry>, StoreError>;
    /// Returns false if the symbol is already listed.
    async fn add_to_watchlist(
        &self,
        user: &UserId,
        entry: &WatchlistEntry,
    ) -> Result<bool, StoreError>;
    /// Returns false if the symbol was not listed.
    async fn remove_from_watchlist(&self, user: &UserId, symbol: &str) -> Result<bool, StoreError>;

    async fn settings(&self, user: &UserId) -> Result<Option<PipelineSettings>, StoreError>;
    async fn save_settings(
        &self,
        user: &UserId,
        settings: &PipelineSettings,
    ) -> Result<(), StoreError>;

    async fn save_log(&self, user: &UserId, entry: &SystemLogEntry) -> Result<(), StoreError>;
    async fn logs(&self, user: &UserId) -> Result<Vec<SystemLogEntry>, StoreError>;
}

// ── Ledger ──────────────────────────────────────────────────────────

/// Everything stored for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserLedger {
    pub signals: Vec<Signal>,
    pub scores: Vec<EvaluationScore>,
    pub simulated_trades: Vec<SimulatedTrade>,
    pub real_trades: Vec<RealTrade>,
    pub watchlist: Vec<WatchlistEntry>,
    pub settings: Option<PipelineSettings>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<SystemLogEntry>,
}

fn upsert<T: Clone>(items: &mut Vec<T>, item: &T, same: impl Fn(&T) -> bool) {
    match items.iter_mut().find(|x| same(x)) {
        Some(slot) => *slot = item.clone(),
        None => items.push(item.clone()),
    }
}

impl UserLedger {
    pub fn save_signal(&mut self, signal: &Signal) {
        upsert(&mut self.signals, signal, |s| s.id == signal.id);
    }

    pub fn save_score(&mut self, score: &EvaluationScore) {
        upsert(&mut self.scores, score, |s| s.id == score.id);
    }

    pub fn mark_score_delivered(&mut self, id: ScoreId) -> Result<bool, StoreError> {
        let score = self
            .scores
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "score",
                id: id.to_string(),
            })?;
        Ok(score.mark_delivered())
    }

    pub fn save_simulated_trade(&mut self, trade: &SimulatedTrade) {
        upsert(&mut self.simulated_trades, trade, |t| t.id == trade.id);
    }

    pub fn update_simulated_trade(&mut self, trade: &SimulatedTrade) -> Result<(), StoreError> {
        let slot = self
            .simulated_trades
            .iter_mut()
            .find(|t| t.id == trade.id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "simulated trade",
                id: trade.id.to_string(),
            })?;
        *slot = trade.clone();
        Ok(())
    }

    pub fn save_real_trade(&mut self, trade: &RealTrade) {
        upsert(&mut self.real_trades, trade, |t| t.id == trade.id);
    }

    pub fn add_to_watchlist(&mut self, entry: &WatchlistEntry) -> bool {
        if self
            .watchlist
            .iter()
            .any(|e| e.symbol.eq_ignore_ascii_case(&entry.symbol))
        {
            return false;
        }
        self.watchlist.push(entry.clone());
        true
    }

    pub fn remove_from_watchlist(&mut self, symbol: &str) -> bool {
        let before = self.watchlist.len();
        self.watchlist.retain(|e| !e.symbol.eq_ignore_ascii_case(symbol));
        self.watchlist.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchlist_dedupes_case_insensitively() {
        let mut ledger = UserLedger::default();
        assert!(ledger.add_to_watchlist(&WatchlistEntry::new("AAPL", "Apple", Market::Us)));
        assert!(!ledger.add_to_watchlist(&WatchlistEntry::new("aapl", "Apple", Market::Us)));
        assert_eq!(ledger.watchlist.len(), 1);
        assert!(ledger.remove_from_watchlist("Aapl"));
        assert!(!ledger.remove_from_watchlist("AAPL"));
    }

    #[test]
    fn unknown_score_is_not_found() {
        let mut ledger = UserLedger::default();
        assert!(matches!(
            ledger.mark_score_delivered(ScoreId::new()),
            Err(StoreError::NotFound { kind: "score", .. })
        ));
    }

    #[test]
    fn empty_json_is_empty_ledger() {
        let ledger: UserLedger = serde_json::from_str("{}").unwrap();
        assert_eq!(ledger, UserLedger::default());
    }
}
