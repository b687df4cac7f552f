//! SignalDesk Runner: automation pipeline, paper trading, delivery, persistence.
//!
//! This crate builds on `signaldesk-core` to provide:
//! - Layered configuration (TOML file, then environment variables)
//! - Automation pipeline: quotes → signal → score → size → trade
//! - Paper-trading simulator with derived cash balance
//! - Brokerage and chat-notification adapters behind traits
//! - Per-user record store (in-memory and JSON file)
//! - Daily report and trade CSV export

pub mod brokerage;
pub mod config;
pub mod delivery;
pub mod notify;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod simulator;
pub mod store;
pub mod symbols;

pub use brokerage::{AlpacaBrokerage, Brokerage, BrokerageError, BrokerageMode, OrderRequest};
pub use config::{AppConfig, ConfigError, PipelineSettings};
pub use delivery::{deliver_passed, deliver_signal, DeliveryReport, DEFAULT_SEND_PAUSE};
pub use notify::{Notifier, StatusUpdate, TelegramNotifier, TradeVenue};
pub use pipeline::{AutomationPipeline, PipelineError, PipelineRequest, PipelineResult, RunSummary};
pub use progress::{LogProgress, NoProgress, PipelineProgress};
pub use report::{export_trades_csv, write_trades_csv, DailyReport, TopSignal};
pub use simulator::{cash_balance, close_trade, position_size, PortfolioSummary, INITIAL_CAPITAL};
pub use store::{JsonFileStore, MemoryStore, RecordStore, StoreError};
pub use symbols::{load_symbols, Scope};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn services_are_send_sync() {
        assert_send::<AutomationPipeline>();
        assert_sync::<AutomationPipeline>();
        assert_send::<AlpacaBrokerage>();
        assert_sync::<AlpacaBrokerage>();
        assert_send::<TelegramNotifier>();
        assert_sync::<TelegramNotifier>();
        assert_send::<JsonFileStore>();
        assert_sync::<JsonFileStore>();
        assert_send::<MemoryStore>();
        assert_sync::<MemoryStore>();
    }

    #[test]
    fn result_types_are_send_sync() {
        assert_send::<PipelineResult>();
        assert_sync::<PipelineResult>();
        assert_send::<DailyReport>();
        assert_sync::<DailyReport>();
        assert_send::<AppConfig>();
        assert_sync::<AppConfig>();
    }

    /// A run must be spawnable on a multi-threaded runtime.
    #[allow(dead_code)]
    fn run_future_is_send(pipeline: &AutomationPipeline, request: PipelineRequest) {
        fn require_send<T: Send>(_: T) {}
        require_send(pipeline.run(request, &NoProgress));
    }
}
