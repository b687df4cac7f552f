//! Narrative enrichment for signals.
//!
//! A `NarrativeProvider` turns a prompt into free text. The reply must carry
//! three labeled lines (`reason:`, `technical:`, `fundamental:`); anything
//! else, or any provider error, falls back to a template built from the
//! indicator values so a signal never has empty text.

use crate::domain::{Direction, Market, TechnicalIndicatorSet};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("network error: {0}")]
    Network(String),

    #[error("http status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed completion: {0}")]
    Malformed(String),

    #[error("provider not configured")]
    NotConfigured,
}

/// A single-shot text completion service.
#[async_trait]
pub trait NarrativeProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, NarrativeError>;
}

/// Rationale triple attached to a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narrative {
    pub reasoning: String,
    pub technical: String,
    pub fundamental: String,
}

/// Everything the prompt and the fallback template need.
#[derive(Debug, Clone, Copy)]
pub struct NarrativeContext<'a> {
    pub symbol: &'a str,
    pub name: &'a str,
    pub market: Market,
    pub price: f64,
    pub direction: Direction,
    pub target_price: f64,
    pub stop_loss: f64,
    pub indicators: &'a TechnicalIndicatorSet,
}

fn rsi_zone(rsi: f64) -> &'static str {
    if rsi < 30.0 {
        "oversold"
    } else if rsi > 70.0 {
        "overbought"
    } else {
        "neutral"
    }
}

pub fn build_prompt(ctx: &NarrativeContext<'_>) -> String {
    let ind = ctx.indicators;
    format!(
        "You are an experienced market analyst. Review the instrument below and explain the suggested call.\n\
         \n\
         Instrument: {name} ({symbol}), market {market}\n\
         Price: {price:.2}\n\
         Suggested call: {direction}, target {target:.2}, stop {stop:.2}\n\
         \n\
         Indicators:\n\
         - RSI: {rsi:.2} ({zone})\n\
         - MACD: {macd:.4} / signal {signal:.4}\n\
         - ADX: {adx:.2} ({strength})\n\
         - SMA20: {sma20:.2} | SMA50: {sma50:.2} | SMA200: {sma200:.2}\n\
         - Bollinger: {bbl:.2} - {bbu:.2}\n\
         \n\
         Reply with exactly three lines:\n\
         reason: <two sentences on why>\n\
         technical: <one sentence technical summary>\n\
         fundamental: <one sentence fundamental summary>",
        name = ctx.name,
        symbol = ctx.symbol,
        market = ctx.market,
        price = ctx.price,
        direction = ctx.direction,
        target = ctx.target_price,
        stop = ctx.stop_loss,
        rsi = ind.rsi,
        zone = rsi_zone(ind.rsi),
        macd = ind.macd,
        signal = ind.macd_signal,
        adx = ind.adx,
        strength = if ind.adx > 25.0 { "strong trend" } else { "weak trend" },
        sma20 = ind.sma20,
        sma50 = ind.sma50,
        sma200 = ind.sma200,
        bbl = ind.bollinger_lower,
        bbu = ind.bollinger_upper,
    )
}

/// Value after `label:` on a line, ignoring case and list/bold markers.
fn labeled<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let trimmed = line
        .trim()
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '#') || c.is_whitespace());
    let head = trimmed.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    let rest = trimmed[label.len()..]
        .trim_start_matches('*')
        .trim_start()
        .strip_prefix(':')?
        .trim()
        .trim_start_matches('*')
        .trim();
    (!rest.is_empty()).then_some(rest)
}

/// Parse the three labeled lines. `None` if any is missing or empty.
pub fn parse_narrative(reply: &str) -> Option<Narrative> {
    let mut reasoning = None;
    let mut technical = None;
    let mut fundamental = None;

    for line in reply.lines() {
        if let Some(v) = labeled(line, "reason") {
            reasoning.get_or_insert(v);
        } else if let Some(v) = labeled(line, "technical") {
            technical.get_or_insert(v);
        } else if let Some(v) = labeled(line, "fundamental") {
            fundamental.get_or_insert(v);
        }
    }

    Some(Narrative {
        reasoning: reasoning?.to_string(),
        technical: technical?.to_string(),
        fundamental: fundamental?.to_string(),
    })
}

pub fn fallback_narrative(ctx: &NarrativeContext<'_>) -> Narrative {
    let ind = ctx.indicators;
    let call = match ctx.direction {
        Direction::Buy => "buy",
        Direction::Sell => "sell",
        Direction::Hold => "hold",
    };

    let mut reasoning = format!(
        "{} ({}) shows a {call} signal from RSI ({:.1}) and the MACD crossover. ",
        ctx.name, ctx.symbol, ind.rsi
    );
    if ind.adx > 25.0 {
        reasoning.push_str(&format!(
            "Trend strength is high (ADX {:.1}), which supports the signal.",
            ind.adx
        ));
    } else {
        reasoning.push_str("Trend strength is weak, so caution is advised.");
    }

    let technical = format!(
        "RSI at {:.1}, MACD {}, price {} the 50-period average.",
        ind.rsi,
        if ind.macd > ind.macd_signal { "positive" } else { "negative" },
        if ctx.price > ind.sma50 { "above" } else { "below" },
    );

    Narrative {
        reasoning,
        technical,
        fundamental: "Fundamentals are broadly in line with the prevailing technical trend."
            .to_string(),
    }
}
