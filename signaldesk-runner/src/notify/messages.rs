//! HTML message bodies for chat notifications.
//!
//! Every formatter takes the timestamp to print, so output is reproducible.
//! Free text from signals is HTML-escaped; numbers and symbols are not.

use chrono::{DateTime, Local};
use signaldesk_core::domain::{Direction, EvaluationScore, Signal, SimulatedTrade, TradeSide};

use crate::report::DailyReport;

/// Longest reasoning excerpt quoted in a signal message, in characters.
const REASONING_EXCERPT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeVenue {
    Simulator,
    Real,
}

/// Totals for the post-run status message.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub total_analyses: usize,
    pub strong_signals: usize,
    pub sent_signals: usize,
    pub average_score: f64,
    pub success: bool,
    pub error: Option<String>,
}

// ── Formatting helpers ──

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// `$1,234.56`, `-$12.00`.
pub fn format_money(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let (whole, frac) = (cents / 100, cents % 100);
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac:02}")
}

/// `+1.25%`, `-0.40%`.
pub fn format_percent(value: f64) -> String {
    let sign = if value >= 0.0 { "+" } else { "" };
    format!("{sign}{value:.2}%")
}

fn direction_emoji(direction: Direction) -> &'static str {
    match direction {
        Direction::Buy => "🟢",
        Direction::Sell => "🔴",
        Direction::Hold => "🟡",
    }
}

fn stamp(at: DateTime<Local>) -> String {
    format!("⏰ {}", at.format("%Y-%m-%d %H:%M:%S"))
}

fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(REASONING_EXCERPT).collect();
    if chars.next().is_some() {
        format!("{}...", escape_html(&head))
    } else {
        escape_html(&head)
    }
}

// ── Messages ──

pub fn trade_notification(
    trade: &SimulatedTrade,
    venue: TradeVenue,
    signal: Option<&Signal>,
    at: DateTime<Local>,
) -> String {
    let emoji = match trade.side {
        TradeSide::Buy => "🟢",
        TradeSide::Sell => "🔴",
    };
    let venue = match venue {
        TradeVenue::Simulator => "🎮 Simulator",
        TradeVenue::Real => "💰 Real",
    };
    let mut msg = format!(
        "{emoji} <b>New {side} trade</b>\n\n\
         📊 <b>Symbol:</b> {symbol}\n\
         🔢 <b>Quantity:</b> {qty}\n\
         💵 <b>Price:</b> {price}\n\
         💰 <b>Total:</b> {total}\n\
         🏷️ <b>Venue:</b> {venue}\n",
        side = trade.side,
        symbol = trade.symbol,
        qty = trade.quantity,
        price = format_money(trade.price),
        total = format_money(trade.total),
    );
    if let Some(s) = signal {
        msg.push_str(&format!(
            "\n🧠 <b>Confidence:</b> {:.1}%\n\
             📈 <b>Target:</b> {}\n\
             🛡️ <b>Stop loss:</b> {}\n",
            s.confidence,
            format_money(s.target_price),
            format_money(s.stop_loss),
        ));
    }
    msg.push('\n');
    msg.push_str(&stamp(at));
    msg
}

pub fn analysis_signal(signal: &Signal, score: &EvaluationScore, at: DateTime<Local>) -> String {
    let ind = &signal.indicators;
    format!(
        "{emoji} <b>Strong {direction} signal!</b>\n\n\
         📊 <b>{name} ({symbol})</b>\n\
         💵 <b>Price:</b> {price}\n\
         🎯 <b>Target:</b> {target}\n\
         🛡️ <b>Stop loss:</b> {stop}\n\n\
         📈 <b>Indicators:</b>\n\
         • RSI: {rsi:.1}\n\
         • MACD: {macd:.4}\n\
         • ADX: {adx:.1}\n\n\
         ⭐ <b>Score:</b> {total:.0}/100\n\
         🔥 <b>Confidence:</b> {confidence:.1}%\n\n\
         💬 <b>Analysis:</b>\n{reasoning}\n\n\
         {stamp}",
        emoji = direction_emoji(signal.direction),
        direction = signal.direction,
        name = escape_html(&signal.name),
        symbol = signal.symbol,
        price = format_money(signal.price),
        target = format_money(signal.target_price),
        stop = format_money(signal.stop_loss),
        rsi = ind.rsi,
        macd = ind.macd,
        adx = ind.adx,
        total = score.total,
        confidence = signal.confidence,
        reasoning = excerpt(&signal.reasoning),
        stamp = stamp(at),
    )
}

pub fn status_update(update: &StatusUpdate, at: DateTime<Local>) -> String {
    let mut msg = format!(
        "{} <b>Automated analysis status</b>\n\n\
         📊 <b>Total analyses:</b> {}\n\
         🔥 <b>Strong signals:</b> {}\n\
         📤 <b>Signals sent:</b> {}\n\
         ⭐ <b>Average score:</b> {:.1}/100\n",
        if update.success { "✅" } else { "❌" },
        update.total_analyses,
        update.strong_signals,
        update.sent_signals,
        update.average_score,
    );
    if let Some(err) = &update.error {
        msg.push_str(&format!("\n❌ <b>Error:</b> {}\n", escape_html(err)));
    }
    msg.push('\n');
    msg.push_str(&stamp(at));
    msg
}

pub fn daily_report(report: &DailyReport, at: DateTime<Local>) -> String {
    let pnl_emoji = if report.realized_pnl >= 0.0 { "📈" } else { "📉" };
    let top = if report.top_signals.is_empty() {
        "No signals".to_string()
    } else {
        report
            .top_signals
            .iter()
            .enumerate()
            .map(|(i, s)| {
                format!(
                    "{}. {} {} - {:.1}% confidence",
                    i + 1,
                    direction_emoji(s.direction),
                    s.symbol,
                    s.confidence
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "📊 <b>Daily report</b>\n\
         📅 {date}\n\n\
         💼 <b>Portfolio value:</b> {value}\n\
         {pnl_emoji} <b>Realized P&amp;L today:</b> {pnl} ({pnl_pct})\n\
         🔄 <b>Trades opened:</b> {trades}\n\
         🏁 <b>Win rate:</b> {win_rate:.1}%\n\n\
         🧮 <b>Signals:</b> {total} ({buy} buy / {sell} sell / {hold} hold)\n\
         ✅ <b>Passed:</b> {passed}, 📤 <b>sent:</b> {delivered}\n\
         ⭐ <b>Average score:</b> {avg_score:.1}/100, 🔥 <b>average confidence:</b> {avg_conf:.1}%\n\n\
         🏆 <b>Top signals today:</b>\n{top}\n\n\
         {stamp}",
        date = report.date.format("%Y-%m-%d"),
        value = format_money(report.portfolio_value),
        pnl = format_money(report.realized_pnl),
        pnl_pct = format_percent(report.realized_pnl_percent),
        trades = report.trades_opened,
        win_rate = report.win_rate,
        total = report.total_signals,
        buy = report.buy_signals,
        sell = report.sell_signals,
        hold = report.hold_signals,
        passed = report.passed,
        delivered = report.delivered,
        avg_score = report.average_score,
        avg_conf = report.average_confidence,
        stamp = stamp(at),
    )
}

pub fn system_alert(message: &str, at: DateTime<Local>) -> String {
    format!(
        "⚠️ <b>System alert</b>\n\n{}\n\n{}",
        escape_html(message),
        stamp(at)
    )
}
