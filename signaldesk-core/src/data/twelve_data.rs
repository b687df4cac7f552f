//! Twelve Data REST vendor.
//!
//! Endpoints: `/price`, `/quote` (comma-separated batch) and `/time_series`.
//! Numbers arrive as strings, a batch may come back as a single object, a
//! map keyed by symbol or an array, and errors are reported in-band as
//! `{"status": "error", "message": ...}`. Everything is parsed from
//! `serde_json::Value` so one odd row never sinks the rest.

use super::provider::{DataError, Interval, MarketDataVendor, QuoteBatch, RawQuote};
use crate::domain::CandleBar;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.twelvedata.com";

pub struct TwelveDataVendor {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TwelveDataVendor {
    pub fn new(api_key: impl Into<String>) -> Result<Self, DataError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, DataError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, DataError> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DataError::Http {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| DataError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl MarketDataVendor for TwelveDataVendor {
    fn name(&self) -> &str {
        "twelve_data"
    }

    async fn price(&self, symbol: &str) -> Result<f64, DataError> {
        let body = self
            .get_json("/price", &[("symbol", symbol.to_string())])
            .await?;
        parse_price(&body)
    }

    async fn quotes(&self, symbols: &[String]) -> Result<QuoteBatch, DataError> {
        let body = self
            .get_json("/quote", &[("symbol", symbols.join(","))])
            .await?;
        parse_quotes(symbols, &body)
    }

    async fn time_series(
        &self,
        symbol: &str,
        interval: Interval,
        size: usize,
    ) -> Result<Vec<CandleBar>, DataError> {
        let body = self
            .get_json(
                "/time_series",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.as_str().to_string()),
                    ("outputsize", size.to_string()),
                ],
            )
            .await?;
        parse_time_series(symbol, &body)
    }
}

/// Number from either a JSON number or a numeric string.
fn num(v: Option<&Value>) -> Option<f64> {
    let parsed = match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|x| x.is_finite())
}

fn vendor_error(v: &Value) -> Option<DataError> {
    if v.get("status").and_then(Value::as_str) == Some("error") {
        let message = v
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown vendor error");
        Some(DataError::Vendor(message.to_string()))
    } else {
        None
    }
}

pub fn parse_price(body: &Value) -> Result<f64, DataError> {
    if let Some(err) = vendor_error(body) {
        return Err(err);
    }
    num(body.get("price"))
        .filter(|p| *p > 0.0)
        .ok_or_else(|| DataError::Malformed(format!("no usable price in {body}")))
}

fn parse_quote_row(row: &Value) -> Result<RawQuote, DataError> {
    if let Some(err) = vendor_error(row) {
        return Err(err);
    }
    let price = num(row.get("close"))
        .or_else(|| num(row.get("price")))
        .ok_or_else(|| DataError::Malformed("quote has no numeric close/price".into()))?;
    let quote = RawQuote {
        price,
        change: num(row.get("change")).unwrap_or(0.0),
        change_percent: num(row.get("percent_change")).unwrap_or(0.0),
        volume: num(row.get("volume")).map(|v| v.max(0.0) as u64).unwrap_or(0),
    };
    if quote.is_valid() {
        Ok(quote)
    } else {
        Err(DataError::Malformed(format!("non-positive price {price}")))
    }
}

/// Accepts the single-object, keyed-map and array shapes of `/quote`.
pub fn parse_quotes(symbols: &[String], body: &Value) -> Result<QuoteBatch, DataError> {
    let mut out: QuoteBatch = HashMap::new();

    match body {
        Value::Array(rows) => {
            for row in rows {
                if let Some(sym) = row.get("symbol").and_then(Value::as_str) {
                    out.insert(sym.to_string(), parse_quote_row(row));
                }
            }
        }
        Value::Object(map) => {
            let looks_single = map.contains_key("close")
                || map.contains_key("price")
                || map.contains_key("symbol");
            if looks_single {
                let sym = body
                    .get("symbol")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| symbols.first().cloned());
                match sym {
                    Some(sym) => {
                        out.insert(sym, parse_quote_row(body));
                    }
                    None => return Err(DataError::Malformed("unkeyed quote".into())),
                }
            } else if let Some(err) = vendor_error(body) {
                return Err(err);
            } else {
                for sym in symbols {
                    if let Some(row) = map.get(sym) {
                        out.insert(sym.clone(), parse_quote_row(row));
                    }
                }
            }
        }
        other => {
            return Err(DataError::Malformed(format!(
                "unexpected quote payload: {other}"
            )))
        }
    }

    Ok(out)
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|dt| dt.and_utc().timestamp())
}

/// Maps `values[]` rows to bars. Rows that fail to parse are skipped; the
/// high/low are widened to cover open and close. Order is left as sent.
pub fn parse_time_series(symbol: &str, body: &Value) -> Result<Vec<CandleBar>, DataError> {
    if let Some(err) = vendor_error(body) {
        return Err(err);
    }
    let rows = body
        .get("values")
        .and_then(Value::as_array)
        .ok_or_else(|| DataError::Malformed("time_series has no values array".into()))?;

    let bars: Vec<CandleBar> = rows
        .iter()
        .filter_map(|row| {
            let time = parse_timestamp(row.get("datetime")?.as_str()?)?;
            let open = num(row.get("open"))?;
            let close = num(row.get("close"))?;
            let high = num(row.get("high"))?.max(open).max(close);
            let low = num(row.get("low"))?.min(open).min(close);
            if low <= 0.0 {
                return None;
            }
            let volume = num(row.get("volume")).map(|v| v.max(0.0) as u64).unwrap_or(0);
            Some(CandleBar {
                time,
                open,
                high,
                low,
                close,
                volume,
            })
        })
        .collect();

    if bars.is_empty() {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    Ok(bars)
}
