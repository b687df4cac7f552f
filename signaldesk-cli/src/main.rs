//! SignalDesk CLI: quotes, signal analysis, automation runs and paper trading.
//!
//! Commands:
//! - `quote`: latest quotes (live, cached or mock)
//! - `candles`: OHLCV history for one symbol
//! - `analyze`: synthesize and score one signal
//! - `run`: automation pipeline over a scope, then deliver passed signals
//! - `deliver`: send passed, undelivered signals
//! - `close`: close a simulated trade
//! - `portfolio`: simulator balance and open positions
//! - `report`: daily summary, optional CSV export and chat delivery
//! - `budget`: market data call budget for today
//! - `watchlist add|remove|list`
//! - `settings`: show or change the user's pipeline settings

mod obs;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use signaldesk_core::clock::SystemClock;
use signaldesk_core::data::{BudgetSnapshot, Interval, MarketDataClient};
use signaldesk_core::domain::{closes, default_universe, Market, SymbolInfo, UserId};
use signaldesk_core::evaluation::evaluate;
use signaldesk_core::rng::SeedSource;
use signaldesk_runner::delivery::{failed_status, send_status_update, status_for};
use signaldesk_runner::notify::messages;
use signaldesk_runner::simulator::{cash_balance, close_trade};
use signaldesk_runner::store::WatchlistEntry;
use signaldesk_runner::{
    deliver_passed, write_trades_csv, AppConfig, AutomationPipeline, DailyReport, JsonFileStore,
    LogProgress, Notifier, PipelineResult, PipelineSettings, PortfolioSummary, RecordStore, Scope,
    DEFAULT_SEND_PAUSE,
};

/// Saved daily call counter, a sidecar of the ledger store.
const BUDGET_FILE: &str = "budget";

#[derive(Parser)]
#[command(
    name = "signaldesk",
    about = "SignalDesk: market signals, scoring and paper trading"
)]
struct Cli {
    /// TOML config file. Credentials can also come from the environment.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Owner of the ledger to read and write.
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// Master seed for synthetic indicators.
    #[arg(long, global = true, default_value_t = 42)]
    seed: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Latest quotes for one or more symbols.
    Quote {
        #[arg(required = true)]
        symbols: Vec<String>,

        /// US, TR, CRYPTO, COMMODITY or INDEX.
        #[arg(long, default_value = "US")]
        market: Market,
    },
    /// OHLCV history, oldest first.
    Candles {
        symbol: String,

        #[arg(long, default_value = "US")]
        market: Market,

        /// 1min, 5min, 15min, 30min, 1h, 4h, 1day, 1week or 1month.
        #[arg(long, default_value = "1day")]
        interval: Interval,

        #[arg(long, default_value_t = 30)]
        size: usize,
    },
    /// Synthesize and score a signal for one symbol.
    Analyze {
        symbol: String,

        #[arg(long, default_value = "US")]
        market: Market,

        /// Feed daily closes to the indicators instead of synthetic values.
        #[arg(long, default_value_t = false)]
        history: bool,

        /// Pass mark. Defaults to the user's setting.
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Run the automation pipeline.
    Run {
        /// watchlist, global, or a market (us, tr, crypto, commodity, index).
        #[arg(long, default_value = "watchlist")]
        scope: Scope,

        /// Skip signal delivery after the run.
        #[arg(long, default_value_t = false)]
        no_deliver: bool,
    },
    /// Send passed signals that have not been delivered yet.
    Deliver,
    /// Close an open simulated trade.
    Close {
        /// Trade id or an unambiguous prefix of it.
        trade_id: String,

        /// Close price. Defaults to the current market price.
        #[arg(long)]
        price: Option<f64>,
    },
    /// Simulator cash, value and open positions.
    Portfolio,
    /// Daily summary.
    Report {
        /// YYYY-MM-DD. Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Also send the report through the notifier.
        #[arg(long, default_value_t = false)]
        send: bool,

        /// Write all simulated trades as CSV to this path.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Market data calls used and left today.
    Budget,
    /// Manage the watchlist.
    Watchlist {
        #[command(subcommand)]
        action: WatchlistAction,
    },
    /// Show the pipeline settings, or change them when any flag is given.
    Settings {
        #[arg(long)]
        min_score: Option<f64>,

        #[arg(long)]
        max_position: Option<f64>,

        #[arg(long)]
        real_trading: Option<bool>,

        #[arg(long)]
        notifications: Option<bool>,

        #[arg(long)]
        fetch_history: Option<bool>,
    },
}

#[derive(Subcommand)]
enum WatchlistAction {
    Add {
        symbol: String,

        #[arg(long, default_value = "US")]
        market: Market,

        /// Display name. Defaults to the built-in name when known.
        #[arg(long)]
        name: Option<String>,
    },
    Remove {
        symbol: String,
    },
    List,
}

/// Collaborators shared by every command.
struct App {
    config: AppConfig,
    user: UserId,
    seed: u64,
    store: Arc<JsonFileStore>,
    market: Arc<MarketDataClient>,
}

impl App {
    fn new(config: AppConfig, user: UserId, seed: u64) -> Result<Self> {
        let store_dir = match &config.store.dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .map(|d| d.join("signaldesk"))
                .context("no platform data directory; set [store] dir in the config")?,
        };
        let store = Arc::new(JsonFileStore::open(&store_dir)?);
        let market = Arc::new(config.market_data_client(Arc::new(SystemClock))?);
        let app = Self {
            config,
            user,
            seed,
            store,
            market,
        };
        app.restore_budget();
        Ok(app)
    }

    fn budget_path(&self) -> PathBuf {
        self.store.sidecar_path(BUDGET_FILE)
    }

    fn restore_budget(&self) {
        let path = self.budget_path();
        let Ok(text) = std::fs::read_to_string(&path) else {
            return;
        };
        match serde_json::from_str::<BudgetSnapshot>(&text) {
            Ok(snapshot) => self.market.scheduler().restore(snapshot),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable budget file"),
        }
    }

    fn save_budget(&self) {
        let path = self.budget_path();
        let snapshot = self.market.scheduler().snapshot();
        let result = serde_json::to_string_pretty(&snapshot)
            .map_err(anyhow::Error::from)
            .and_then(|json| std::fs::write(&path, json).map_err(anyhow::Error::from));
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "could not save budget");
        }
    }

    /// Stored per-user settings, else the config file's.
    async fn settings(&self) -> Result<PipelineSettings> {
        Ok(self
            .store
            .settings(&self.user)
            .await?
            .unwrap_or_else(|| self.config.pipeline.clone()))
    }

    fn notifier(&self) -> Result<Option<Arc<dyn Notifier>>> {
        Ok(self.config.notifier()?)
    }

    fn require_notifier(&self) -> Result<Arc<dyn Notifier>> {
        self.notifier()?
            .context("no notifier configured; set TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    obs::init_tracing(&config.logging.level, &config.logging.format)
        .map_err(anyhow::Error::msg)?;

    let app = App::new(config, UserId::new(cli.user), cli.seed)?;

    let outcome = match cli.command {
        Commands::Quote { symbols, market } => run_quote(&app, &symbols, market).await,
        Commands::Candles {
            symbol,
            market,
            interval,
            size,
        } => run_candles(&app, &symbol, market, interval, size).await,
        Commands::Analyze {
            symbol,
            market,
            history,
            threshold,
        } => run_analyze(&app, &symbol, market, history, threshold).await,
        Commands::Run { scope, no_deliver } => run_pipeline(&app, scope, !no_deliver).await,
        Commands::Deliver => run_deliver(&app).await,
        Commands::Close { trade_id, price } => run_close(&app, &trade_id, price).await,
        Commands::Portfolio => run_portfolio(&app).await,
        Commands::Report { date, send, csv } => run_report(&app, date, send, csv.as_deref()).await,
        Commands::Budget => {
            print_budget(&app);
            Ok(())
        }
        Commands::Watchlist { action } => run_watchlist(&app, action).await,
        Commands::Settings {
            min_score,
            max_position,
            real_trading,
            notifications,
            fetch_history,
        } => {
            run_settings(
                &app,
                min_score,
                max_position,
                real_trading,
                notifications,
                fetch_history,
            )
            .await
        }
    };

    app.save_budget();
    outcome
}

/// Built-in display name when the symbol is in the market's universe.
fn symbol_info(symbol: &str, market: Market) -> SymbolInfo {
    default_universe(market)
        .into_iter()
        .find(|s| s.symbol.eq_ignore_ascii_case(symbol))
        .unwrap_or_else(|| SymbolInfo::new(symbol.to_ascii_uppercase(), symbol, market))
}

async fn run_quote(app: &App, symbols: &[String], market: Market) -> Result<()> {
    let infos: Vec<SymbolInfo> = symbols.iter().map(|s| symbol_info(s, market)).collect();
    let quotes = app.market.get_quotes(&infos).await;

    println!(
        "{:<10} {:>12} {:>10} {:>9} {:>14} {:>6}",
        "Symbol", "Price", "Change", "Change%", "Volume", "Source"
    );
    println!("{}", "-".repeat(66));
    for q in &quotes {
        println!(
            "{:<10} {:>12.2} {:>+10.2} {:>+8.2}% {:>14} {:>6}",
            q.symbol,
            q.price,
            q.change,
            q.change_percent,
            q.volume,
            format!("{:?}", q.source).to_lowercase()
        );
    }
    Ok(())
}

async fn run_candles(
    app: &App,
    symbol: &str,
    market: Market,
    interval: Interval,
    size: usize,
) -> Result<()> {
    let info = symbol_info(symbol, market);
    let bars = app
        .market
        .get_candles(&info.symbol, market, interval, size)
        .await;

    println!("{} ({interval}, {} bars)", info.symbol, bars.len());
    println!(
        "{:<17} {:>11} {:>11} {:>11} {:>11} {:>13}",
        "Time", "Open", "High", "Low", "Close", "Volume"
    );
    println!("{}", "-".repeat(78));
    for b in &bars {
        let time = DateTime::<Utc>::from_timestamp(b.time, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| b.time.to_string());
        println!(
            "{:<17} {:>11.4} {:>11.4} {:>11.4} {:>11.4} {:>13}",
            time, b.open, b.high, b.low, b.close, b.volume
        );
    }
    Ok(())
}

async fn run_analyze(
    app: &App,
    symbol: &str,
    market: Market,
    history: bool,
    threshold: Option<f64>,
) -> Result<()> {
    let settings = app.settings().await?;
    let info = symbol_info(symbol, market);
    let price = app.market.get_price(&info.symbol, market).await;
    let daily_closes = if history {
        closes(
            &app.market
                .get_candles(&info.symbol, market, Interval::OneDay, settings.history_size)
                .await,
        )
    } else {
        Vec::new()
    };

    let synthesizer = app.config.synthesizer(SeedSource::new(app.seed))?;
    let signal = synthesizer
        .analyze(&info.symbol, &info.name, market, price, &daily_closes)
        .await;
    let score = evaluate(&signal, threshold.unwrap_or(settings.min_signal_score));
    app.store.save_signal(&app.user, &signal).await?;
    app.store.save_score(&app.user, &score).await?;

    let ind = &signal.indicators;
    println!();
    println!("=== {} ({}) ===", signal.name, signal.symbol);
    println!("Direction:      {}", signal.direction);
    println!("Confidence:     {:.1}% ({:?})", signal.confidence, signal.tier);
    println!("Price:          {:.4}", signal.price);
    println!("Target:         {:.4}", signal.target_price);
    println!("Stop loss:      {:.4}", signal.stop_loss);
    println!();
    println!("--- Indicators ---");
    println!("RSI:            {:.2}", ind.rsi);
    println!("MACD / signal:  {:.4} / {:.4}", ind.macd, ind.macd_signal);
    println!("SMA20 / SMA50:  {:.4} / {:.4}", ind.sma20, ind.sma50);
    println!("ADX:            {:.2}", ind.adx);
    println!("Momentum:       {:.2}", ind.momentum);
    println!();
    println!("--- Score ---");
    println!("Oscillator:     {:.0}", score.oscillator);
    println!("Trend confirm:  {:.0}", score.trend_confirmation);
    println!("Trend strength: {:.0}", score.trend_strength);
    println!("Alignment:      {:.0}", score.alignment);
    println!("Momentum:       {:.0}", score.momentum);
    println!(
        "Total:          {:.0}/100 ({})",
        score.total,
        if score.passed { "PASSED" } else { "below threshold" }
    );
    println!();
    println!("{}", signal.reasoning);
    println!();
    Ok(())
}

async fn run_pipeline(app: &App, scope: Scope, deliver: bool) -> Result<()> {
    let settings = app.settings().await?;
    let trades = app.store.simulated_trades(&app.user).await?;
    let cash = cash_balance(settings.simulator_balance, &trades);
    let notifier = app.notifier()?;

    let pipeline = AutomationPipeline::new(
        app.market.clone(),
        Arc::new(app.config.synthesizer(SeedSource::new(app.seed))?),
        app.store.clone(),
    )
    .with_brokerage(app.config.brokerage()?)
    .with_notifier(notifier.clone());

    let result = match pipeline
        .run_scope(scope, app.user.clone(), settings.clone(), cash, &LogProgress)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            if let (Some(n), true) = (&notifier, settings.enable_notifications) {
                send_status_update(n.as_ref(), &failed_status(&e)).await;
            }
            return Err(e.into());
        }
    };
    print_run(&result);

    let mut sent = 0;
    if let (Some(n), true) = (&notifier, deliver && settings.enable_notifications) {
        let report = deliver_passed(n.as_ref(), app.store.as_ref(), &app.user, DEFAULT_SEND_PAUSE)
            .await?;
        println!("Signals delivered: {} of {}", report.sent, report.attempted);
        sent = report.sent;
    }
    if let (Some(n), true) = (&notifier, settings.enable_notifications) {
        send_status_update(n.as_ref(), &status_for(&result, sent)).await;
    }
    Ok(())
}

fn print_run(result: &PipelineResult) {
    let s = &result.summary;
    println!();
    println!("=== Automation Run ===");
    println!("Analyzed:       {}", s.symbols_analyzed);
    println!("Passed:         {}", s.passed);
    println!("Trades opened:  {}", s.trades_opened);
    println!("Already open:   {}", s.duplicates_skipped);
    println!("Unaffordable:   {}", s.unaffordable_skipped);
    println!("Broker failures:{}", s.failed_real_trades);
    println!("Average score:  {:.1}", result.average_score());
    println!("Cash after run: {}", messages::format_money(result.updated_cash));
    if s.mock_quotes > 0 {
        println!();
        println!("NOTE: {} quote(s) served from mock data", s.mock_quotes);
    }
    if !result.simulated_trades.is_empty() {
        println!();
        println!("{:<10} {:<5} {:>10} {:>12} {:>14} {:<10}", "Symbol", "Side", "Qty", "Price", "Total", "Real");
        println!("{}", "-".repeat(66));
        for (t, real) in result.simulated_trades.iter().zip(&result.real_trades) {
            println!(
                "{:<10} {:<5} {:>10} {:>12.4} {:>14.2} {:<10}",
                t.symbol, t.side, t.quantity, t.price, t.total, real.status
            );
        }
    }
    println!();
}

async fn run_deliver(app: &App) -> Result<()> {
    let notifier = app.require_notifier()?;
    let report = deliver_passed(
        notifier.as_ref(),
        app.store.as_ref(),
        &app.user,
        DEFAULT_SEND_PAUSE,
    )
    .await?;
    println!(
        "Delivered {} of {} signal(s); {} failed, {} without a stored signal.",
        report.sent, report.attempted, report.failed, report.missing_signal
    );
    Ok(())
}

async fn run_close(app: &App, trade_id: &str, price: Option<f64>) -> Result<()> {
    let settings = app.settings().await?;
    let trades = app.store.simulated_trades(&app.user).await?;
    let matches: Vec<_> = trades
        .iter()
        .filter(|t| t.is_open() && t.id.to_string().starts_with(trade_id))
        .collect();
    let trade = match matches.as_slice() {
        [one] => *one,
        [] => bail!("no open trade matches '{trade_id}'"),
        _ => bail!("'{trade_id}' matches {} open trades; use more of the id", matches.len()),
    };

    let close_price = match price {
        Some(p) => p,
        None => app.market.get_price(&trade.symbol, trade.market).await,
    };
    let closed = close_trade(trade, close_price, Utc::now())?;
    app.store
        .update_simulated_trade(&app.user, &closed.trade)
        .await?;

    let after: Vec<_> = trades
        .iter()
        .map(|t| if t.id == closed.trade.id { closed.trade.clone() } else { t.clone() })
        .collect();
    let pnl = closed.trade.pnl.unwrap_or(0.0);
    println!(
        "Closed {} {} {} @ {:.4}: PnL {} ({})",
        closed.trade.side,
        closed.trade.quantity,
        closed.trade.symbol,
        close_price,
        messages::format_money(pnl),
        messages::format_percent(closed.trade.pnl_percent.unwrap_or(0.0)),
    );
    println!(
        "Cash: {}",
        messages::format_money(cash_balance(settings.simulator_balance, &after))
    );
    Ok(())
}

async fn run_portfolio(app: &App) -> Result<()> {
    let settings = app.settings().await?;
    let trades = app.store.simulated_trades(&app.user).await?;
    let cash = cash_balance(settings.simulator_balance, &trades);
    let s = PortfolioSummary::compute(cash, &trades, settings.simulator_balance);

    println!();
    println!("=== Portfolio ({}) ===", app.user);
    println!("Cash:           {}", messages::format_money(s.cash));
    println!("Invested:       {}", messages::format_money(s.invested));
    println!("Value:          {}", messages::format_money(s.value));
    println!(
        "Total return:   {} ({})",
        messages::format_money(s.total_return),
        messages::format_percent(s.total_return_percent)
    );
    println!("Realized PnL:   {}", messages::format_money(s.realized_pnl));
    println!("Closed trades:  {} ({:.1}% winners)", s.closed_trades, s.win_rate);

    let open: Vec<_> = trades.iter().filter(|t| t.is_open()).collect();
    if !open.is_empty() {
        println!();
        println!("{:<10} {:<10} {:<5} {:>10} {:>12} {:>14}", "Id", "Symbol", "Side", "Qty", "Entry", "Total");
        println!("{}", "-".repeat(66));
        for t in open {
            let id = t.id.to_string();
            println!(
                "{:<10} {:<10} {:<5} {:>10} {:>12.4} {:>14.2}",
                &id[..8.min(id.len())],
                t.symbol,
                t.side,
                t.quantity,
                t.price,
                t.total
            );
        }
    }
    println!();
    Ok(())
}

async fn run_report(app: &App, date: Option<NaiveDate>, send: bool, csv: Option<&Path>) -> Result<()> {
    let settings = app.settings().await?;
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let signals = app.store.signals(&app.user).await?;
    let scores = app.store.scores(&app.user).await?;
    let trades = app.store.simulated_trades(&app.user).await?;
    let cash = cash_balance(settings.simulator_balance, &trades);
    let report = DailyReport::build(
        date,
        &signals,
        &scores,
        &trades,
        cash,
        settings.simulator_balance,
    );

    println!();
    println!("=== Daily Report {} ===", report.date);
    println!(
        "Signals:        {} ({} buy / {} sell / {} hold)",
        report.total_signals, report.buy_signals, report.sell_signals, report.hold_signals
    );
    println!("Passed:         {} ({} delivered)", report.passed, report.delivered);
    println!("Average score:  {:.1}", report.average_score);
    println!("Avg confidence: {:.1}%", report.average_confidence);
    println!("Trades opened:  {}", report.trades_opened);
    println!("Win rate:       {:.1}%", report.win_rate);
    println!(
        "Realized PnL:   {} ({})",
        messages::format_money(report.realized_pnl),
        messages::format_percent(report.realized_pnl_percent)
    );
    println!("Portfolio:      {}", messages::format_money(report.portfolio_value));
    for (i, top) in report.top_signals.iter().enumerate() {
        println!("  {}. {} {} {:.1}%", i + 1, top.symbol, top.direction, top.confidence);
    }
    println!();

    if let Some(path) = csv {
        write_trades_csv(&trades, path)?;
        println!("Trades written to: {}", path.display());
    }
    if send {
        let notifier = app.require_notifier()?;
        if !notifier.send(&messages::daily_report(&report, Local::now())).await {
            bail!("notifier '{}' did not accept the report", notifier.name());
        }
        println!("Report sent via {}", notifier.name());
    }
    Ok(())
}

fn print_budget(app: &App) {
    let scheduler = app.market.scheduler();
    println!(
        "Data source:    {}",
        if app.market.serving_mock() { "mock" } else { "live" }
    );
    println!(
        "Calls today:    {} of {}",
        scheduler.calls_today(),
        scheduler.config().daily_budget
    );
    println!("Remaining:      {}", scheduler.remaining_today());
    println!(
        "Resets at:      {}",
        scheduler.next_reset().format("%Y-%m-%d %H:%M")
    );
}

async fn run_watchlist(app: &App, action: WatchlistAction) -> Result<()> {
    match action {
        WatchlistAction::Add {
            symbol,
            market,
            name,
        } => {
            let info = symbol_info(&symbol, market);
            let entry = WatchlistEntry::new(info.symbol, name.unwrap_or(info.name), market);
            if app.store.add_to_watchlist(&app.user, &entry).await? {
                println!("Added {} ({})", entry.symbol, entry.market);
            } else {
                println!("{} is already on the watchlist", entry.symbol);
            }
        }
        WatchlistAction::Remove { symbol } => {
            if app.store.remove_from_watchlist(&app.user, &symbol).await? {
                println!("Removed {symbol}");
            } else {
                println!("{symbol} is not on the watchlist");
            }
        }
        WatchlistAction::List => {
            let entries = app.store.watchlist(&app.user).await?;
            if entries.is_empty() {
                println!("Watchlist is empty.");
                return Ok(());
            }
            println!("{:<10} {:<10} {:<30} {}", "Symbol", "Market", "Name", "Added");
            println!("{}", "-".repeat(66));
            for e in &entries {
                println!(
                    "{:<10} {:<10} {:<30} {}",
                    e.symbol,
                    e.market,
                    e.name,
                    e.added_at.with_timezone(&Local).format("%Y-%m-%d")
                );
            }
        }
    }
    Ok(())
}

async fn run_settings(
    app: &App,
    min_score: Option<f64>,
    max_position: Option<f64>,
    real_trading: Option<bool>,
    notifications: Option<bool>,
    fetch_history: Option<bool>,
) -> Result<()> {
    let mut settings = app.settings().await?;
    let changed = min_score.is_some()
        || max_position.is_some()
        || real_trading.is_some()
        || notifications.is_some()
        || fetch_history.is_some();

    if let Some(v) = min_score {
        settings.min_signal_score = v;
    }
    if let Some(v) = max_position {
        settings.max_position_percent = v;
    }
    if let Some(v) = real_trading {
        settings.enable_real_trading = v;
    }
    if let Some(v) = notifications {
        settings.enable_notifications = v;
    }
    if let Some(v) = fetch_history {
        settings.fetch_history = v;
    }

    if changed {
        settings.validate()?;
        app.store.save_settings(&app.user, &settings).await?;
        tracing::info!(user = %app.user, "settings saved");
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
