//! Automation pipeline.
//!
//! One run, strictly sequential per symbol:
//!
//! 1. dedupe symbols, fetch all quotes with one `get_quotes`
//! 2. optionally fetch daily candles to feed the synthesizer
//! 3. synthesize a signal, score it
//! 4. passed, not HOLD, no OPEN trade on the symbol → size the position
//! 5. open a simulated trade and move cash
//! 6. record a real trade: SIMULATED unless real trading is enabled and a
//!    brokerage is configured; a broker failure records FAILED
//!
//! Store writes never fail a run: errors are logged and the in-memory
//! result is returned regardless. Cash and the open-symbol set are locals,
//! which is why symbols are processed one at a time.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use signaldesk_core::analysis::SignalSynthesizer;
use signaldesk_core::data::{Interval, MarketDataClient};
use signaldesk_core::domain::{
    closes, Direction, EvaluationScore, RealTrade, RealTradeStatus, Signal, SimulatedTrade,
    SymbolInfo, TradeId, UserId,
};
use signaldesk_core::evaluation::evaluate;

use crate::brokerage::{Brokerage, OrderRequest};
use crate::config::PipelineSettings;
use crate::notify::{messages, Notifier, TradeVenue};
use crate::progress::PipelineProgress;
use crate::simulator::{open_cash_delta, open_symbols, open_trade, position_size};
use crate::store::{LogStatus, RecordStore, StoreError, SystemLogEntry};
use crate::symbols::{dedupe, load_symbols, Scope};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to load symbols: {0}")]
    Symbols(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub user: UserId,
    pub symbols: Vec<SymbolInfo>,
    pub settings: PipelineSettings,
    /// Simulator cash before the run.
    pub cash: f64,
    /// Trades already on the books; OPEN ones block a second position.
    pub existing_trades: Vec<SimulatedTrade>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub symbols_analyzed: usize,
    pub passed: usize,
    pub trades_opened: usize,
    pub duplicates_skipped: usize,
    /// Passed signals whose position size rounded down to zero.
    pub unaffordable_skipped: usize,
    pub failed_real_trades: usize,
    pub mock_quotes: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub signals: Vec<Signal>,
    pub scores: Vec<EvaluationScore>,
    pub simulated_trades: Vec<SimulatedTrade>,
    pub real_trades: Vec<RealTrade>,
    pub updated_cash: f64,
    pub summary: RunSummary,
}

impl PipelineResult {
    fn empty(cash: f64) -> Self {
        Self {
            signals: Vec::new(),
            scores: Vec::new(),
            simulated_trades: Vec::new(),
            real_trades: Vec::new(),
            updated_cash: cash,
            summary: RunSummary::default(),
        }
    }

    /// Mean score total; 0 for an empty run.
    pub fn average_score(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().map(|s| s.total).sum::<f64>() / self.scores.len() as f64
    }
}

fn warn_on_err(op: &str, symbol: &str, result: Result<(), StoreError>) {
    if let Err(e) = result {
        tracing::warn!(op, symbol, error = %e, "store write failed, continuing");
    }
}

pub struct AutomationPipeline {
    market: Arc<MarketDataClient>,
    synthesizer: Arc<SignalSynthesizer>,
    store: Arc<dyn RecordStore>,
    brokerage: Option<Arc<dyn Brokerage>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl AutomationPipeline {
    pub fn new(
        market: Arc<MarketDataClient>,
        synthesizer: Arc<SignalSynthesizer>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            market,
            synthesizer,
            store,
            brokerage: None,
            notifier: None,
        }
    }

    pub fn with_brokerage(mut self, brokerage: Option<Arc<dyn Brokerage>>) -> Self {
        self.brokerage = brokerage;
        self
    }

    pub fn with_notifier(mut self, notifier: Option<Arc<dyn Notifier>>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn market(&self) -> &MarketDataClient {
        &self.market
    }

    /// Resolve `scope` through the store, then `run`.
    ///
    /// A failed watchlist read is the only error. Failing to read existing
    /// trades is logged and treated as "no open positions".
    pub async fn run_scope(
        &self,
        scope: Scope,
        user: UserId,
        settings: PipelineSettings,
        cash: f64,
        progress: &dyn PipelineProgress,
    ) -> Result<PipelineResult, PipelineError> {
        let symbols = load_symbols(scope, self.store.as_ref(), &user).await?;
        let existing_trades = match self.store.simulated_trades(&user).await {
            Ok(trades) => trades,
            Err(e) => {
                tracing::warn!(error = %e, "could not read existing trades, assuming none open");
                Vec::new()
            }
        };
        tracing::info!(%scope, symbols = symbols.len(), "pipeline run starting");
        Ok(self
            .run(
                PipelineRequest {
                    user,
                    symbols,
                    settings,
                    cash,
                    existing_trades,
                },
                progress,
            )
            .await)
    }

    pub async fn run(
        &self,
        request: PipelineRequest,
        progress: &dyn PipelineProgress,
    ) -> PipelineResult {
        let PipelineRequest {
            user,
            symbols,
            settings,
            cash,
            existing_trades,
        } = request;
        let mut result = PipelineResult::empty(cash);
        let mut open = open_symbols(&existing_trades);

        progress.on_progress("preparing symbols", 10.0);
        let symbols = dedupe(symbols);
        if symbols.is_empty() {
            progress.on_progress("nothing to analyze", 100.0);
            return result;
        }

        let quotes = self.market.get_quotes(&symbols).await;
        result.summary.mock_quotes = quotes.iter().filter(|q| q.is_mock()).count();
        progress.on_progress("prices updated", 20.0);

        let total = quotes.len();
        for (index, quote) in quotes.iter().enumerate() {
            progress.on_progress(
                &format!("analyzing {}", quote.symbol),
                20.0 + (index + 1) as f64 / total as f64 * 75.0,
            );

            let history = if settings.fetch_history {
                let bars = self
                    .market
                    .get_candles(&quote.symbol, quote.market, Interval::OneDay, settings.history_size)
                    .await;
                closes(&bars)
            } else {
                Vec::new()
            };

            let signal = self
                .synthesizer
                .analyze(&quote.symbol, &quote.name, quote.market, quote.price, &history)
                .await;
            progress.on_signal(&signal);
            warn_on_err("save signal", &signal.symbol, self.store.save_signal(&user, &signal).await);
            self.audit(
                &user,
                SystemLogEntry::new(
                    "ANALYSIS_SAVED",
                    "AI_ANALYSIS",
                    Some(signal.id.to_string()),
                    LogStatus::Success,
                    json!({
                        "symbol": signal.symbol,
                        "direction": signal.direction,
                        "confidence": signal.confidence,
                    }),
                ),
            )
            .await;

            let score = evaluate(&signal, settings.min_signal_score);
            progress.on_score(&score);
            warn_on_err("save score", &score.symbol, self.store.save_score(&user, &score).await);
            self.audit(
                &user,
                SystemLogEntry::new(
                    "EVALUATION_SAVED",
                    "EVALUATION_SCORE",
                    Some(score.id.to_string()),
                    LogStatus::Success,
                    json!({
                        "symbol": score.symbol,
                        "total": score.total,
                        "passed": score.passed,
                    }),
                ),
            )
            .await;

            result.summary.symbols_analyzed += 1;
            if score.passed {
                result.summary.passed += 1;
            }
            if score.passed && signal.direction != Direction::Hold {
                self.act(&user, &settings, &signal, &mut open, &mut result, progress)
                    .await;
            }

            result.signals.push(signal);
            result.scores.push(score);
        }

        progress.on_progress("automation cycle complete", 100.0);
        tracing::info!(
            analyzed = result.summary.symbols_analyzed,
            passed = result.summary.passed,
            trades = result.summary.trades_opened,
            cash = result.updated_cash,
            "pipeline run finished"
        );
        result
    }

    /// Position guard, sizing, simulated and real trade for one passed signal.
    async fn act(
        &self,
        user: &UserId,
        settings: &PipelineSettings,
        signal: &Signal,
        open: &mut HashSet<String>,
        result: &mut PipelineResult,
        progress: &dyn PipelineProgress,
    ) {
        if open.contains(&signal.symbol) {
            result.summary.duplicates_skipped += 1;
            tracing::debug!(symbol = %signal.symbol, "position already open, skipping");
            self.audit(
                user,
                SystemLogEntry::new(
                    "SIMULATOR_TRADE_SKIPPED_DUPLICATE",
                    "SIMULATOR_TRADE",
                    None,
                    LogStatus::Info,
                    json!({ "symbol": signal.symbol }),
                ),
            )
            .await;
            return;
        }

        let quantity = position_size(result.updated_cash, settings.max_position_percent, signal.price);
        let Some(trade) = open_trade(signal, quantity, user).filter(|_| quantity > 0.0) else {
            result.summary.unaffordable_skipped += 1;
            tracing::debug!(
                symbol = %signal.symbol,
                cash = result.updated_cash,
                price = signal.price,
                "position size is zero, skipping"
            );
            return;
        };

        warn_on_err(
            "save simulated trade",
            &trade.symbol,
            self.store.save_simulated_trade(user, &trade).await,
        );
        open.insert(trade.symbol.clone());
        result.updated_cash += open_cash_delta(&trade);
        result.summary.trades_opened += 1;
        self.audit(
            user,
            SystemLogEntry::new(
                "SIMULATOR_TRADE_AUTO_OPENED",
                "SIMULATOR_TRADE",
                Some(trade.id.to_string()),
                LogStatus::Success,
                json!({
                    "symbol": trade.symbol,
                    "quantity": trade.quantity,
                    "total": trade.total,
                }),
            ),
        )
        .await;
        progress.on_simulated_trade(&trade, result.updated_cash);

        if settings.enable_notifications {
            if let Some(notifier) = &self.notifier {
                let text = messages::trade_notification(
                    &trade,
                    TradeVenue::Simulator,
                    Some(signal),
                    Local::now(),
                );
                let sent = notifier.send(&text).await;
                tracing::debug!(symbol = %trade.symbol, sent, "trade notification");
            }
        }

        let real = self.real_trade(user, settings, signal, &trade).await;
        if real.status == RealTradeStatus::Failed {
            result.summary.failed_real_trades += 1;
        }
        warn_on_err("save real trade", &real.symbol, self.store.save_real_trade(user, &real).await);
        self.audit(
            user,
            SystemLogEntry::new(
                "REAL_TRADE_AUTO_SENT",
                "REAL_TRADE",
                Some(real.id.to_string()),
                if real.status == RealTradeStatus::Failed {
                    LogStatus::Failed
                } else {
                    LogStatus::Success
                },
                json!({
                    "symbol": real.symbol,
                    "quantity": real.quantity,
                    "status": real.status.to_string(),
                }),
            ),
        )
        .await;
        progress.on_real_trade(&real);

        result.simulated_trades.push(trade);
        result.real_trades.push(real);
    }

    async fn real_trade(
        &self,
        user: &UserId,
        settings: &PipelineSettings,
        signal: &Signal,
        trade: &SimulatedTrade,
    ) -> RealTrade {
        let mut record = RealTrade {
            id: TradeId::new(),
            user_id: user.clone(),
            symbol: trade.symbol.clone(),
            side: trade.side,
            quantity: trade.quantity,
            price: signal.price,
            total: trade.total,
            broker_order_id: None,
            status: RealTradeStatus::Simulated,
            signal_id: Some(signal.id),
            created_at: Utc::now(),
        };

        let broker = match (&self.brokerage, settings.enable_real_trading) {
            (Some(broker), true) => broker,
            _ => return record,
        };

        let order = OrderRequest::market(&trade.symbol, trade.quantity, trade.side);
        match broker.place_order(&order).await {
            Ok(placed) => {
                let price = placed.filled_avg_price.unwrap_or(signal.price);
                record.price = price;
                record.total = price * trade.quantity;
                record.broker_order_id = Some(placed.id);
                record.status = RealTradeStatus::Broker(placed.status);
            }
            Err(e) => {
                tracing::warn!(
                    symbol = %trade.symbol,
                    broker = broker.name(),
                    error = %e,
                    "order failed, recording FAILED"
                );
                record.status = RealTradeStatus::Failed;
            }
        }
        record
    }

    async fn audit(&self, user: &UserId, entry: SystemLogEntry) {
        if let Err(e) = self.store.save_log(user, &entry).await {
            tracing::warn!(action = %entry.action, error = %e, "system log write failed");
        }
    }
}
