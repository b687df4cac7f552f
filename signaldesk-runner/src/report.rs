//! Daily summary and trade export.
//!
//! "That day" is the local calendar date of each record's `created_at`
//! (`closed_at` for realized PnL).

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use signaldesk_core::domain::{Direction, EvaluationScore, Signal, SimulatedTrade};

use crate::simulator::PortfolioSummary;

/// Signals quoted in the report, highest confidence first.
const TOP_SIGNALS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopSignal {
    pub symbol: String,
    pub direction: Direction,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub total_signals: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub hold_signals: usize,
    pub passed: usize,
    pub delivered: usize,
    pub average_score: f64,
    pub average_confidence: f64,
    pub trades_opened: usize,
    /// Percent of trades closed that day with positive PnL.
    pub win_rate: f64,
    pub portfolio_value: f64,
    pub realized_pnl: f64,
    /// `realized_pnl` relative to initial capital.
    pub realized_pnl_percent: f64,
    pub top_signals: Vec<TopSignal>,
}

fn local_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

impl DailyReport {
    /// Summarize `date` from the full record history.
    ///
    /// `cash` is the current simulator balance; the portfolio value is
    /// always "now", not as of `date`.
    pub fn build(
        date: NaiveDate,
        signals: &[Signal],
        scores: &[EvaluationScore],
        trades: &[SimulatedTrade],
        cash: f64,
        initial_capital: f64,
    ) -> Self {
        let day_signals: Vec<&Signal> = signals
            .iter()
            .filter(|s| local_date(s.created_at) == date)
            .collect();
        let day_scores: Vec<&EvaluationScore> = scores
            .iter()
            .filter(|s| local_date(s.created_at) == date)
            .collect();
        let closed_today: Vec<&SimulatedTrade> = trades
            .iter()
            .filter(|t| t.closed_at.is_some_and(|at| local_date(at) == date))
            .collect();

        let count = |d: Direction| day_signals.iter().filter(|s| s.direction == d).count();

        let mut ranked = day_signals.clone();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        let top_signals = ranked
            .into_iter()
            .take(TOP_SIGNALS)
            .map(|s| TopSignal {
                symbol: s.symbol.clone(),
                direction: s.direction,
                confidence: s.confidence,
            })
            .collect();

        let realized_pnl: f64 = closed_today.iter().filter_map(|t| t.pnl).sum();
        let winners = closed_today.iter().filter(|t| t.is_winner()).count();

        Self {
            date,
            total_signals: day_signals.len(),
            buy_signals: count(Direction::Buy),
            sell_signals: count(Direction::Sell),
            hold_signals: count(Direction::Hold),
            passed: day_scores.iter().filter(|s| s.passed).count(),
            delivered: day_scores.iter().filter(|s| s.delivered).count(),
            average_score: mean(day_scores.iter().map(|s| s.total)),
            average_confidence: mean(day_signals.iter().map(|s| s.confidence)),
            trades_opened: trades
                .iter()
                .filter(|t| local_date(t.created_at) == date)
                .count(),
            win_rate: if closed_today.is_empty() {
                0.0
            } else {
                winners as f64 / closed_today.len() as f64 * 100.0
            },
            portfolio_value: PortfolioSummary::compute(cash, trades, initial_capital).value,
            realized_pnl,
            realized_pnl_percent: if initial_capital > 0.0 {
                realized_pnl / initial_capital * 100.0
            } else {
                0.0
            },
            top_signals,
        }
    }
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Simulated trades as CSV, one row per trade; open trades leave the
/// close columns empty.
pub fn export_trades_csv(trades: &[SimulatedTrade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "id",
        "symbol",
        "market",
        "side",
        "quantity",
        "price",
        "total",
        "status",
        "close_price",
        "pnl",
        "pnl_percent",
        "created_at",
        "closed_at",
    ])?;

    let opt = |v: Option<f64>, digits: usize| {
        v.map(|x| format!("{x:.digits$}")).unwrap_or_default()
    };

    for t in trades {
        let id = t.id.to_string();
        let quantity = format!("{:.4}", t.quantity);
        let price = format!("{:.4}", t.price);
        let total = format!("{:.2}", t.total);
        let status = if t.is_open() { "OPEN" } else { "CLOSED" };
        let close_price = opt(t.close_price, 4);
        let pnl = opt(t.pnl, 2);
        let pnl_percent = opt(t.pnl_percent, 2);
        let created_at = t.created_at.to_rfc3339();
        let closed_at = t.closed_at.map(|at| at.to_rfc3339()).unwrap_or_default();
        let record: [&str; 13] = [
            &id,
            &t.symbol,
            t.market.as_str(),
            t.side.as_str(),
            &quantity,
            &price,
            &total,
            status,
            &close_price,
            &pnl,
            &pnl_percent,
            &created_at,
            &closed_at,
        ];
        wtr.write_record(record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn write_trades_csv(trades: &[SimulatedTrade], path: &Path) -> Result<()> {
    let csv = export_trades_csv(trades)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}
