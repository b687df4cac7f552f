//! Market data vendor trait and structured error types.
//!
//! The `MarketDataVendor` trait abstracts over the HTTP vendor so the access
//! layer can be tested with counting fakes. Vendors report failures as
//! `DataError`; the access layer never lets one escape.

use crate::domain::CandleBar;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("network error: {0}")]
    Network(String),

    #[error("http status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("vendor reported error: {0}")]
    Vendor(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("data source not configured")]
    NotConfigured,
}

impl From<reqwest::Error> for DataError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            DataError::Http {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            DataError::Network(e.to_string())
        }
    }
}

/// Core quote fields as parsed from a vendor row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: u64,
}

impl RawQuote {
    /// Price must be a finite positive number; the rest must be finite.
    pub fn is_valid(&self) -> bool {
        self.price.is_finite()
            && self.price > 0.0
            && self.change.is_finite()
            && self.change_percent.is_finite()
    }
}

/// Per-symbol outcome of a batched quote request.
pub type QuoteBatch = HashMap<String, Result<RawQuote, DataError>>;

/// Candle interval accepted by the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1min")]
    OneMinute,
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[serde(rename = "30min")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1day")]
    OneDay,
    #[serde(rename = "1week")]
    OneWeek,
    #[serde(rename = "1month")]
    OneMonth,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::OneMinute => "1min",
            Interval::FiveMinutes => "5min",
            Interval::FifteenMinutes => "15min",
            Interval::ThirtyMinutes => "30min",
            Interval::OneHour => "1h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1day",
            Interval::OneWeek => "1week",
            Interval::OneMonth => "1month",
        }
    }

    /// Nominal bar length in seconds (a month counts as 30 days).
    pub fn seconds(self) -> i64 {
        match self {
            Interval::OneMinute => 60,
            Interval::FiveMinutes => 300,
            Interval::FifteenMinutes => 900,
            Interval::ThirtyMinutes => 1_800,
            Interval::OneHour => 3_600,
            Interval::FourHours => 14_400,
            Interval::OneDay => 86_400,
            Interval::OneWeek => 604_800,
            Interval::OneMonth => 2_592_000,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1min" => Ok(Interval::OneMinute),
            "5min" => Ok(Interval::FiveMinutes),
            "15min" => Ok(Interval::FifteenMinutes),
            "30min" => Ok(Interval::ThirtyMinutes),
            "1h" => Ok(Interval::OneHour),
            "4h" => Ok(Interval::FourHours),
            "1day" => Ok(Interval::OneDay),
            "1week" => Ok(Interval::OneWeek),
            "1month" => Ok(Interval::OneMonth),
            other => Err(format!("unknown interval '{other}'")),
        }
    }
}

/// An HTTP market-data vendor.
///
/// Implementations do one request per call. Pacing, budgeting and caching
/// live above this trait.
#[async_trait]
pub trait MarketDataVendor: Send + Sync {
    fn name(&self) -> &str;

    /// Last price for one symbol.
    async fn price(&self, symbol: &str) -> Result<f64, DataError>;

    /// Quotes for a batch. The outer error is for whole-request failures;
    /// per-symbol problems go in the map. Symbols the vendor omitted are
    /// simply absent.
    async fn quotes(&self, symbols: &[String]) -> Result<QuoteBatch, DataError>;

    /// Bars for one symbol, in whatever order the vendor returns them.
    async fn time_series(
        &self,
        symbol: &str,
        interval: Interval,
        size: usize,
    ) -> Result<Vec<CandleBar>, DataError>;
}
