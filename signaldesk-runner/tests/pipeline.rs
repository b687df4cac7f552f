//! Automation pipeline runs against mock market data and in-process fakes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use signaldesk_core::analysis::SignalSynthesizer;
use signaldesk_core::clock::SystemClock;
use signaldesk_core::data::{
    DataError, Interval, MarketDataClient, MarketDataConfig, MarketDataVendor, QuoteBatch,
    RawQuote, SchedulerConfig,
};
use signaldesk_core::domain::{
    default_universe, CandleBar, Direction, EvaluationScore, Market, RealTrade, RealTradeStatus, ScoreId,
    Signal, SimulatedTrade, SymbolInfo, TradeId, TradeStatus, UserId,
};
use signaldesk_core::indicators::{ema, rsi, sma, RSI_PERIOD};
use signaldesk_core::rng::SeedSource;
use signaldesk_runner::brokerage::{Account, Order, Position};
use signaldesk_runner::simulator::{cash_balance, INITIAL_CAPITAL};
use signaldesk_runner::store::{SystemLogEntry, WatchlistEntry};
use signaldesk_runner::{
    AutomationPipeline, Brokerage, BrokerageError, MemoryStore, Notifier, OrderRequest,
    PipelineProgress, PipelineRequest, PipelineSettings, RecordStore, Scope, StoreError,
};

// ── Fakes ──

#[derive(Default)]
struct Recorder {
    percents: Mutex<Vec<f64>>,
    trades: Mutex<Vec<f64>>,
}

impl PipelineProgress for Recorder {
    fn on_progress(&self, _message: &str, percent: f64) {
        self.percents.lock().unwrap().push(percent);
    }

    fn on_simulated_trade(&self, _trade: &SimulatedTrade, cash: f64) {
        self.trades.lock().unwrap().push(cash);
    }
}

#[derive(Default)]
struct CountingNotifier {
    sent: Mutex<usize>,
}

#[async_trait]
impl Notifier for CountingNotifier {
    fn name(&self) -> &str {
        "counting"
    }

    async fn send(&self, _text: &str) -> bool {
        *self.sent.lock().unwrap() += 1;
        true
    }
}

/// Fills every order at `fill`, or rejects everything when `fill` is None.
struct FakeBroker {
    fill: Option<f64>,
    orders: Mutex<Vec<OrderRequest>>,
}

impl FakeBroker {
    fn new(fill: Option<f64>) -> Self {
        Self {
            fill,
            orders: Mutex::new(Vec::new()),
        }
    }
}

fn unsupported() -> BrokerageError {
    BrokerageError::InvalidOrder("not supported by fake".into())
}

#[async_trait]
impl Brokerage for FakeBroker {
    fn name(&self) -> &str {
        "fake"
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<Order, BrokerageError> {
        self.orders.lock().unwrap().push(order.clone());
        let fill = self.fill.ok_or(BrokerageError::Http {
            status: 403,
            message: "insufficient buying power".into(),
        })?;
        Ok(Order {
            id: format!("ord-{}", order.symbol),
            client_order_id: String::new(),
            symbol: order.symbol.clone(),
            qty: order.qty,
            filled_qty: order.qty,
            side: order.side.as_str().to_ascii_lowercase(),
            order_type: "market".into(),
            time_in_force: "day".into(),
            status: "filled".into(),
            filled_avg_price: Some(fill),
            created_at: None,
            filled_at: None,
        })
    }

    async fn cancel_order(&self, _order_id: &str) -> Result<(), BrokerageError> {
        Err(unsupported())
    }

    async fn account(&self) -> Result<Account, BrokerageError> {
        Err(unsupported())
    }

    async fn positions(&self) -> Result<Vec<Position>, BrokerageError> {
        Err(unsupported())
    }

    async fn open_orders(&self, _limit: u32) -> Result<Vec<Order>, BrokerageError> {
        Err(unsupported())
    }

    async fn close_position(&self, _symbol: &str) -> Result<Order, BrokerageError> {
        Err(unsupported())
    }
}

/// Every call fails.
struct BrokenStore;

fn down() -> StoreError {
    StoreError::Unavailable("disk on fire".into())
}

#[async_trait]
impl RecordStore for BrokenStore {
    async fn save_signal(&self, _: &UserId, _: &Signal) -> Result<(), StoreError> {
        Err(down())
    }
    async fn signals(&self, _: &UserId) -> Result<Vec<Signal>, StoreError> {
        Err(down())
    }
    async fn save_score(&self, _: &UserId, _: &EvaluationScore) -> Result<(), StoreError> {
        Err(down())
    }
    async fn scores(&self, _: &UserId) -> Result<Vec<EvaluationScore>, StoreError> {
        Err(down())
    }
    async fn mark_score_delivered(&self, _: &UserId, _: ScoreId) -> Result<bool, StoreError> {
        Err(down())
    }
    async fn save_simulated_trade(&self, _: &UserId, _: &SimulatedTrade) -> Result<(), StoreError> {
        Err(down())
    }
    async fn update_simulated_trade(
        &self,
        _: &UserId,
        _: &SimulatedTrade,
    ) -> Result<(), StoreError> {
        Err(down())
    }
    async fn simulated_trades(&self, _: &UserId) -> Result<Vec<SimulatedTrade>, StoreError> {
        Err(down())
    }
    async fn save_real_trade(&self, _: &UserId, _: &RealTrade) -> Result<(), StoreError> {
        Err(down())
    }
    async fn real_trades(&self, _: &UserId) -> Result<Vec<RealTrade>, StoreError> {
        Err(down())
    }
    async fn watchlist(&self, _: &UserId) -> Result<Vec<WatchlistEntry>, StoreError> {
        Err(down())
    }
    async fn add_to_watchlist(&self, _: &UserId, _: &WatchlistEntry) -> Result<bool, StoreError> {
        Err(down())
    }
    async fn remove_from_watchlist(&self, _: &UserId, _: &str) -> Result<bool, StoreError> {
        Err(down())
    }
    async fn settings(&self, _: &UserId) -> Result<Option<PipelineSettings>, StoreError> {
        Err(down())
    }
    async fn save_settings(&self, _: &UserId, _: &PipelineSettings) -> Result<(), StoreError> {
        Err(down())
    }
    async fn save_log(&self, _: &UserId, _: &SystemLogEntry) -> Result<(), StoreError> {
        Err(down())
    }
    async fn logs(&self, _: &UserId) -> Result<Vec<SystemLogEntry>, StoreError> {
        Err(down())
    }
}

// ── Helpers ──

fn pipeline(store: Arc<dyn RecordStore>) -> AutomationPipeline {
    AutomationPipeline::new(
        Arc::new(MarketDataClient::mock_only(Arc::new(SystemClock))),
        Arc::new(SignalSynthesizer::new(SeedSource::new(42))),
        store,
    )
}

/// Twenty symbols priced well under 10% of the starting capital.
fn affordable_symbols() -> Vec<SymbolInfo> {
    let mut symbols = default_universe(Market::Us);
    symbols.extend(default_universe(Market::Tr));
    symbols
}

/// Everything passes, so every non-HOLD signal should trade.
fn lenient() -> PipelineSettings {
    PipelineSettings {
        min_signal_score: 0.0,
        ..PipelineSettings::default()
    }
}

fn request(symbols: Vec<SymbolInfo>, settings: PipelineSettings) -> PipelineRequest {
    PipelineRequest {
        user: UserId::new("trader"),
        symbols,
        settings,
        cash: INITIAL_CAPITAL,
        existing_trades: Vec::new(),
    }
}

fn open_trade_on(symbol: &str) -> SimulatedTrade {
    SimulatedTrade {
        id: TradeId::new(),
        user_id: UserId::new("trader"),
        symbol: symbol.into(),
        name: symbol.into(),
        market: Market::Us,
        side: signaldesk_core::domain::TradeSide::Buy,
        quantity: 1.0,
        price: 10.0,
        total: 10.0,
        status: TradeStatus::Open,
        close_price: None,
        pnl: None,
        pnl_percent: None,
        signal_id: None,
        created_at: Utc::now(),
        closed_at: None,
    }
}

// ── Tests ──

#[tokio::test]
async fn trades_follow_passed_non_hold_signals_and_cash_replays() {
    let store = Arc::new(MemoryStore::new());
    let p = pipeline(store.clone());
    let result = p
        .run(request(affordable_symbols(), lenient()), &signaldesk_runner::NoProgress)
        .await;

    assert_eq!(result.summary.symbols_analyzed, 20);
    assert_eq!(result.signals.len(), 20);
    assert_eq!(result.scores.len(), 20);
    assert_eq!(result.summary.mock_quotes, 20);
    assert_eq!(result.summary.passed, 20);

    let actionable = result
        .signals
        .iter()
        .filter(|s| s.direction != Direction::Hold)
        .count();
    assert!(actionable > 0);
    assert_eq!(result.summary.trades_opened, actionable);
    assert_eq!(result.simulated_trades.len(), actionable);
    assert_eq!(result.real_trades.len(), actionable);

    for trade in &result.simulated_trades {
        let signal = result
            .signals
            .iter()
            .find(|s| Some(s.id) == trade.signal_id)
            .unwrap();
        assert_ne!(signal.direction, Direction::Hold);
        assert!(trade.quantity >= 1.0);
        assert_eq!(trade.quantity, trade.quantity.floor());
        assert_eq!(trade.price, signal.price);
    }
    // no brokerage configured
    assert!(result
        .real_trades
        .iter()
        .all(|t| t.status == RealTradeStatus::Simulated && t.broker_order_id.is_none()));

    let replayed = cash_balance(INITIAL_CAPITAL, &result.simulated_trades);
    assert!((result.updated_cash - replayed).abs() < 1e-6);

    let user = UserId::new("trader");
    assert_eq!(store.signals(&user).await.unwrap().len(), 20);
    assert_eq!(store.scores(&user).await.unwrap().len(), 20);
    assert_eq!(store.simulated_trades(&user).await.unwrap().len(), actionable);
    let logs = store.logs(&user).await.unwrap();
    assert_eq!(logs.iter().filter(|l| l.action == "ANALYSIS_SAVED").count(), 20);
    assert_eq!(
        logs.iter()
            .filter(|l| l.action == "SIMULATOR_TRADE_AUTO_OPENED")
            .count(),
        actionable
    );
}

#[tokio::test]
async fn nothing_passes_an_unreachable_threshold() {
    let settings = PipelineSettings {
        min_signal_score: 101.0,
        ..PipelineSettings::default()
    };
    let result = pipeline(Arc::new(MemoryStore::new()))
        .run(request(affordable_symbols(), settings), &signaldesk_runner::NoProgress)
        .await;
    assert_eq!(result.summary.passed, 0);
    assert!(result.simulated_trades.is_empty());
    assert_eq!(result.updated_cash, INITIAL_CAPITAL);
}

#[tokio::test]
async fn open_positions_block_second_trade() {
    let symbols = affordable_symbols();
    let mut req = request(symbols.clone(), lenient());
    req.existing_trades = symbols.iter().map(|s| open_trade_on(&s.symbol)).collect();

    let result = pipeline(Arc::new(MemoryStore::new()))
        .run(req, &signaldesk_runner::NoProgress)
        .await;
    let actionable = result
        .signals
        .iter()
        .filter(|s| s.direction != Direction::Hold)
        .count();
    assert!(result.simulated_trades.is_empty());
    assert_eq!(result.summary.duplicates_skipped, actionable);
    assert_eq!(result.updated_cash, INITIAL_CAPITAL);
}

#[tokio::test]
async fn repeated_symbols_are_analyzed_once() {
    let mut symbols = affordable_symbols();
    symbols.extend(affordable_symbols());
    let result = pipeline(Arc::new(MemoryStore::new()))
        .run(request(symbols, lenient()), &signaldesk_runner::NoProgress)
        .await;
    assert_eq!(result.summary.symbols_analyzed, 20);
}

#[tokio::test]
async fn zero_cash_skips_every_trade() {
    let mut req = request(affordable_symbols(), lenient());
    req.cash = 0.0;
    let result = pipeline(Arc::new(MemoryStore::new()))
        .run(req, &signaldesk_runner::NoProgress)
        .await;
    assert!(result.simulated_trades.is_empty());
    assert!(result.real_trades.is_empty());
    assert_eq!(result.updated_cash, 0.0);
    assert!(result.summary.unaffordable_skipped > 0);
}

#[tokio::test]
async fn progress_checkpoints_are_ordered() {
    let progress = Recorder::default();
    let result = pipeline(Arc::new(MemoryStore::new()))
        .run(request(affordable_symbols(), lenient()), &progress)
        .await;

    let percents = progress.percents.lock().unwrap().clone();
    assert_eq!(percents.first(), Some(&10.0));
    assert_eq!(percents.get(1), Some(&20.0));
    assert_eq!(percents.last(), Some(&100.0));
    // 10, 20, one per symbol, 100
    assert_eq!(percents.len(), 2 + 20 + 1);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert!((percents[21] - 95.0).abs() < 1e-9);

    assert_eq!(progress.trades.lock().unwrap().len(), result.simulated_trades.len());
}

#[tokio::test]
async fn empty_symbol_list_still_completes() {
    let progress = Recorder::default();
    let result = pipeline(Arc::new(MemoryStore::new()))
        .run(request(Vec::new(), lenient()), &progress)
        .await;
    assert_eq!(result.summary.symbols_analyzed, 0);
    assert_eq!(*progress.percents.lock().unwrap(), vec![10.0, 100.0]);
}

#[tokio::test]
async fn broker_fill_price_is_recorded() {
    let broker = Arc::new(FakeBroker::new(Some(123.45)));
    let settings = PipelineSettings {
        enable_real_trading: true,
        ..lenient()
    };
    let result = pipeline(Arc::new(MemoryStore::new()))
        .with_brokerage(Some(broker.clone()))
        .run(request(affordable_symbols(), settings), &signaldesk_runner::NoProgress)
        .await;

    assert!(!result.real_trades.is_empty());
    assert_eq!(broker.orders.lock().unwrap().len(), result.real_trades.len());
    for (real, sim) in result.real_trades.iter().zip(&result.simulated_trades) {
        assert_eq!(real.status, RealTradeStatus::Broker("filled".into()));
        assert_eq!(real.price, 123.45);
        assert!((real.total - 123.45 * sim.quantity).abs() < 1e-9);
        assert_eq!(real.quantity, sim.quantity);
        assert_eq!(real.side, sim.side);
        assert!(real.broker_order_id.is_some());
    }
}

#[tokio::test]
async fn broker_rejection_records_failed_without_stopping_the_run() {
    let broker = Arc::new(FakeBroker::new(None));
    let settings = PipelineSettings {
        enable_real_trading: true,
        ..lenient()
    };
    let result = pipeline(Arc::new(MemoryStore::new()))
        .with_brokerage(Some(broker))
        .run(request(affordable_symbols(), settings), &signaldesk_runner::NoProgress)
        .await;

    assert_eq!(result.summary.symbols_analyzed, 20);
    assert!(!result.real_trades.is_empty());
    assert_eq!(result.summary.failed_real_trades, result.real_trades.len());
    assert!(result
        .real_trades
        .iter()
        .all(|t| t.status == RealTradeStatus::Failed));
    // the simulated side is unaffected
    assert_eq!(result.simulated_trades.len(), result.real_trades.len());
}

#[tokio::test]
async fn brokerage_ignored_while_real_trading_is_disabled() {
    let broker = Arc::new(FakeBroker::new(Some(1.0)));
    let result = pipeline(Arc::new(MemoryStore::new()))
        .with_brokerage(Some(broker.clone()))
        .run(request(affordable_symbols(), lenient()), &signaldesk_runner::NoProgress)
        .await;
    assert!(broker.orders.lock().unwrap().is_empty());
    assert!(result
        .real_trades
        .iter()
        .all(|t| t.status == RealTradeStatus::Simulated));
}

#[tokio::test]
async fn trade_notifications_respect_the_setting() {
    let notifier = Arc::new(CountingNotifier::default());
    let result = pipeline(Arc::new(MemoryStore::new()))
        .with_notifier(Some(notifier.clone()))
        .run(request(affordable_symbols(), lenient()), &signaldesk_runner::NoProgress)
        .await;
    assert_eq!(*notifier.sent.lock().unwrap(), result.simulated_trades.len());

    let quiet = Arc::new(CountingNotifier::default());
    let settings = PipelineSettings {
        enable_notifications: false,
        ..lenient()
    };
    pipeline(Arc::new(MemoryStore::new()))
        .with_notifier(Some(quiet.clone()))
        .run(request(affordable_symbols(), settings), &signaldesk_runner::NoProgress)
        .await;
    assert_eq!(*quiet.sent.lock().unwrap(), 0);
}

#[tokio::test]
async fn store_failures_do_not_abort_a_run() {
    let result = pipeline(Arc::new(BrokenStore))
        .run(request(affordable_symbols(), lenient()), &signaldesk_runner::NoProgress)
        .await;
    assert_eq!(result.summary.symbols_analyzed, 20);
    assert!(!result.simulated_trades.is_empty());
}

#[tokio::test]
async fn watchlist_scope_reads_the_store() {
    let store = Arc::new(MemoryStore::new());
    let user = UserId::new("trader");
    for symbol in ["AAPL", "MSFT"] {
        store
            .add_to_watchlist(&user, &WatchlistEntry::new(symbol, symbol, Market::Us))
            .await
            .unwrap();
    }

    let result = pipeline(store.clone())
        .run_scope(
            Scope::Watchlist,
            user,
            lenient(),
            INITIAL_CAPITAL,
            &signaldesk_runner::NoProgress,
        )
        .await
        .unwrap();
    let symbols: Vec<&str> = result.signals.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(symbols, ["AAPL", "MSFT"]);
}

#[tokio::test]
async fn watchlist_scope_surfaces_store_errors() {
    let err = pipeline(Arc::new(BrokenStore))
        .run_scope(
            Scope::Watchlist,
            UserId::new("trader"),
            lenient(),
            INITIAL_CAPITAL,
            &signaldesk_runner::NoProgress,
        )
        .await;
    assert!(err.is_err());
}

#[tokio::test]
async fn market_scope_survives_unreadable_trade_history() {
    let result = pipeline(Arc::new(BrokenStore))
        .run_scope(
            Scope::Market(Market::Us),
            UserId::new("trader"),
            lenient(),
            INITIAL_CAPITAL,
            &signaldesk_runner::NoProgress,
        )
        .await
        .unwrap();
    assert_eq!(result.summary.symbols_analyzed, 10);
}

// ── History-backed indicators ──

/// Live vendor that answers every quote and serves a fixed 30-day series.
#[derive(Default)]
struct SeriesVendor {
    series_calls: Mutex<Vec<String>>,
}

impl SeriesVendor {
    /// Oldest first, the order the pipeline sees after the client sorts.
    fn closes() -> Vec<f64> {
        (0..30).map(|i| 100.0 + i as f64 * 0.5 + (i % 4) as f64).collect()
    }
}

#[async_trait]
impl MarketDataVendor for SeriesVendor {
    fn name(&self) -> &str {
        "series"
    }

    async fn price(&self, _symbol: &str) -> Result<f64, DataError> {
        Ok(100.0)
    }

    async fn quotes(&self, symbols: &[String]) -> Result<QuoteBatch, DataError> {
        Ok(symbols
            .iter()
            .map(|s| {
                let row = RawQuote {
                    price: 110.0,
                    change: 1.0,
                    change_percent: 0.9,
                    volume: 10,
                };
                (s.clone(), Ok(row))
            })
            .collect())
    }

    async fn time_series(
        &self,
        symbol: &str,
        _interval: Interval,
        _size: usize,
    ) -> Result<Vec<CandleBar>, DataError> {
        self.series_calls.lock().unwrap().push(symbol.to_string());
        // Newest first, like the real API.
        Ok(Self::closes()
            .into_iter()
            .enumerate()
            .rev()
            .map(|(i, close)| CandleBar {
                time: 1_700_000_000 + i as i64 * 86_400,
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1,
            })
            .collect())
    }
}

#[tokio::test(start_paused = true)]
async fn fetch_history_feeds_real_closes_into_the_indicators() {
    let vendor = Arc::new(SeriesVendor::default());
    let market = MarketDataClient::new(
        Some(vendor.clone() as Arc<dyn MarketDataVendor>),
        MarketDataConfig::default(),
        Arc::new(SystemClock),
    );
    let p = AutomationPipeline::new(
        Arc::new(market),
        Arc::new(SignalSynthesizer::new(SeedSource::new(42))),
        Arc::new(MemoryStore::new()),
    );
    let symbols: Vec<SymbolInfo> = default_universe(Market::Us).into_iter().take(3).collect();
    let settings = PipelineSettings {
        fetch_history: true,
        history_size: 30,
        ..lenient()
    };

    let result = p
        .run(request(symbols.clone(), settings), &signaldesk_runner::NoProgress)
        .await;

    let fetched = vendor.series_calls.lock().unwrap().clone();
    let wanted: Vec<String> = symbols.iter().map(|s| s.symbol.clone()).collect();
    assert_eq!(fetched, wanted);

    let closes = SeriesVendor::closes();
    assert_eq!(result.signals.len(), 3);
    for signal in &result.signals {
        assert_eq!(signal.indicators.rsi, rsi(&closes, RSI_PERIOD));
        assert_eq!(signal.indicators.sma20, sma(&closes, 20));
        assert_eq!(signal.indicators.ema20, ema(&closes, 20));
    }
}

#[tokio::test]
async fn without_fetch_history_no_series_is_requested() {
    let vendor = Arc::new(SeriesVendor::default());
    let market = MarketDataClient::new(
        Some(vendor.clone() as Arc<dyn MarketDataVendor>),
        MarketDataConfig {
            scheduler: SchedulerConfig {
                min_interval: std::time::Duration::ZERO,
                ..SchedulerConfig::default()
            },
            ..MarketDataConfig::default()
        },
        Arc::new(SystemClock),
    );
    let p = AutomationPipeline::new(
        Arc::new(market),
        Arc::new(SignalSynthesizer::new(SeedSource::new(42))),
        Arc::new(MemoryStore::new()),
    );
    let symbols: Vec<SymbolInfo> = default_universe(Market::Us).into_iter().take(2).collect();
    p.run(request(symbols, lenient()), &signaldesk_runner::NoProgress)
        .await;
    assert!(vendor.series_calls.lock().unwrap().is_empty());
}
