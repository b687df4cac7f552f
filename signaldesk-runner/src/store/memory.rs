//! In-process store. Contents die with the process.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use signaldesk_core::domain::{
    EvaluationScore, RealTrade, ScoreId, Signal, SimulatedTrade, UserId,
};

use super::{RecordStore, StoreError, SystemLogEntry, UserLedger, WatchlistEntry};
use crate::config::PipelineSettings;

#[derive(Default)]
pub struct MemoryStore {
    ledgers: Mutex<HashMap<UserId, UserLedger>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_ledger<T>(&self, user: &UserId, f: impl FnOnce(&mut UserLedger) -> T) -> T {
        let mut ledgers = self.ledgers.lock().unwrap_or_else(PoisonError::into_inner);
        f(ledgers.entry(user.clone()).or_default())
    }

    /// Copy of a user's ledger, empty if the user is unknown.
    pub fn snapshot(&self, user: &UserId) -> UserLedger {
        self.with_ledger(user, |l| l.clone())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn save_signal(&self, user: &UserId, signal: &Signal) -> Result<(), StoreError> {
        self.with_ledger(user, |l| l.save_signal(signal));
        Ok(())
    }

    async fn signals(&self, user: &UserId) -> Result<Vec<Signal>, StoreError> {
        Ok(self.with_ledger(user, |l| l.signals.clone()))
    }

    async fn save_score(&self, user: &UserId, score: &EvaluationScore) -> Result<(), StoreError> {
        self.with_ledger(user, |l| l.save_score(score));
        Ok(())
    }

    async fn scores(&self, user: &UserId) -> Result<Vec<EvaluationScore>, StoreError> {
        Ok(self.with_ledger(user, |l| l.scores.clone()))
    }

    async fn mark_score_delivered(&self, user: &UserId, id: ScoreId) -> Result<bool, StoreError> {
        self.with_ledger(user, |l| l.mark_score_delivered(id))
    }

    async fn save_simulated_trade(
        &self,
        user: &UserId,
        trade: &SimulatedTrade,
    ) -> Result<(), StoreError> {
        self.with_ledger(user, |l| l.save_simulated_trade(trade));
        Ok(())
    }

    async fn update_simulated_trade(
        &self,
        user: &UserId,
        trade: &SimulatedTrade,
    ) -> Result<(), StoreError> {
        self.with_ledger(user, |l| l.update_simulated_trade(trade))
    }

    async fn simulated_trades(&self, user: &UserId) -> Result<Vec<SimulatedTrade>, StoreError> {
        Ok(self.with_ledger(user, |l| l.simulated_trades.clone()))
    }

    async fn save_real_trade(&self, user: &UserId, trade: &RealTrade) -> Result<(), StoreError> {
        self.with_ledger(user, |l| l.save_real_trade(trade));
        Ok(())
    }

    async fn real_trades(&self, user: &UserId) -> Result<Vec<RealTrade>, StoreError> {
        Ok(self.with_ledger(user, |l| l.real_trades.clone()))
    }

    async fn watchlist(&self, user: &UserId) -> Result<Vec<WatchlistEntry>, StoreError> {
        Ok(self.with_ledger(user, |l| l.watchlist.clone()))
    }

    async fn add_to_watchlist(
        &self,
        user: &UserId,
        entry: &WatchlistEntry,
    ) -> Result<bool, StoreError> {
        Ok(self.with_ledger(user, |l| l.add_to_watchlist(entry)))
    }

    async fn remove_from_watchlist(&self, user: &UserId, symbol: &str) -> Result<bool, StoreError> {
        Ok(self.with_ledger(user, |l| l.remove_from_watchlist(symbol)))
    }

    async fn settings(&self, user: &UserId) -> Result<Option<PipelineSettings>, StoreError> {
        Ok(self.with_ledger(user, |l| l.settings.clone()))
    }

    async fn save_settings(
        &self,
        user: &UserId,
        settings: &PipelineSettings,
    ) -> Result<(), StoreError> {
        self.with_ledger(user, |l| l.settings = Some(settings.clone()));
        Ok(())
    }

    async fn save_log(&self, user: &UserId, entry: &SystemLogEntry) -> Result<(), StoreError> {
        self.with_ledger(user, |l| l.logs.push(entry.clone()));
        Ok(())
    }

    async fn logs(&self, user: &UserId) -> Result<Vec<SystemLogEntry>, StoreError> {
        Ok(self.with_ledger(user, |l| l.logs.clone()))
    }
}
