//! Market data access layer.
//!
//! Answers "price for symbol", "quotes for a symbol set" and "candles for a
//! symbol" from, in order: the TTL cache, the vendor (through the request
//! scheduler), and the deterministic mock generator. Nothing here returns an
//! error. Every failure path degrades to mock data at the smallest possible
//! granularity: one symbol inside a batch, never the whole batch.

use super::mock::{mock_candles, mock_price, mock_quote};
use super::provider::{DataError, Interval, MarketDataVendor};
use super::scheduler::{RequestScheduler, SchedulerConfig};
use super::ttl_cache::TtlCache;
use crate::clock::Clock;
use crate::domain::{CandleBar, DataSource, Market, Quote, SymbolInfo};
use chrono::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default lifetime of a cached price or quote.
pub const DEFAULT_CACHE_TTL_SECS: i64 = 300;

/// Symbols per `/quote` request.
pub const DEFAULT_BATCH_SIZE: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct MarketDataConfig {
    pub scheduler: SchedulerConfig,
    pub cache_ttl: Duration,
    pub batch_size: usize,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            cache_ttl: Duration::seconds(DEFAULT_CACHE_TTL_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Single decision point for mock mode.
///
/// Mock data is served when no vendor is configured or today's budget is
/// spent. Both cases are normal operation, not errors.
pub fn should_use_mock(configured: bool, over_budget: bool) -> bool {
    !configured || over_budget
}

/// Unwrap a vendor result or log and substitute the fallback.
pub fn or_mock<T>(result: Result<T, DataError>, symbol: &str, fallback: impl FnOnce() -> T) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(symbol, error = %e, "vendor call failed, using mock data");
            fallback()
        }
    }
}

pub struct MarketDataClient {
    vendor: Option<Arc<dyn MarketDataVendor>>,
    scheduler: RequestScheduler,
    prices: Mutex<TtlCache<String, f64>>,
    quotes: Mutex<TtlCache<String, Quote>>,
    clock: Arc<dyn Clock>,
    config: MarketDataConfig,
}

impl MarketDataClient {
    pub fn new(
        vendor: Option<Arc<dyn MarketDataVendor>>,
        config: MarketDataConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            vendor,
            scheduler: RequestScheduler::new(config.scheduler, clock.clone()),
            prices: Mutex::new(TtlCache::new(clock.clone())),
            quotes: Mutex::new(TtlCache::new(clock.clone())),
            clock,
            config: MarketDataConfig {
                batch_size: config.batch_size.max(1),
                ..config
            },
        }
    }

    /// Client with no vendor: every answer is mock data.
    pub fn mock_only(clock: Arc<dyn Clock>) -> Self {
        Self::new(None, MarketDataConfig::default(), clock)
    }

    pub fn scheduler(&self) -> &RequestScheduler {
        &self.scheduler
    }

    pub fn is_configured(&self) -> bool {
        self.vendor.is_some()
    }

    /// What the dashboard's "data source" indicator should show right now.
    pub fn serving_mock(&self) -> bool {
        should_use_mock(self.is_configured(), self.scheduler.is_over_daily_limit())
    }

    /// The vendor, unless mock mode applies at this moment.
    fn live_vendor(&self) -> Option<&Arc<dyn MarketDataVendor>> {
        if should_use_mock(self.is_configured(), self.scheduler.is_over_daily_limit()) {
            None
        } else {
            self.vendor.as_ref()
        }
    }

    fn price_cache(&self) -> MutexGuard<'_, TtlCache<String, f64>> {
        self.prices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn quote_cache(&self) -> MutexGuard<'_, TtlCache<String, Quote>> {
        self.quotes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn get_price(&self, symbol: &str, market: Market) -> f64 {
        let key = symbol.to_string();
        let cached = self.price_cache().get(&key);
        if let Some(price) = cached {
            tracing::debug!(symbol, price, "price cache hit");
            return price;
        }

        let Some(vendor) = self.live_vendor() else {
            return mock_price(symbol, market);
        };

        let result = self
            .scheduler
            .throttle(|| vendor.price(symbol))
            .await
            .and_then(|p| {
                if p.is_finite() && p > 0.0 {
                    Ok(p)
                } else {
                    Err(DataError::Malformed(format!("non-positive price {p}")))
                }
            });

        if let Ok(price) = result {
            self.price_cache().set(key, price, self.config.cache_ttl);
        }
        or_mock(result, symbol, || mock_price(symbol, market))
    }

    /// Quotes in input order, carrying the input's name/market/currency.
    pub async fn get_quotes(&self, symbols: &[SymbolInfo]) -> Vec<Quote> {
        let mut resolved: HashMap<String, Quote> = HashMap::new();
        let mut needed: Vec<&SymbolInfo> = Vec::new();
        let mut seen = HashSet::new();

        {
            let mut cache = self.quote_cache();
            for info in symbols {
                if !seen.insert(info.symbol.as_str()) {
                    continue;
                }
                match cache.get(&info.symbol) {
                    Some(q) => {
                        resolved.insert(info.symbol.clone(), q.relabel(info, DataSource::Cache));
                    }
                    None => needed.push(info),
                }
            }
        }

        if !needed.is_empty() {
            tracing::debug!(
                cached = resolved.len(),
                needed = needed.len(),
                "resolving quotes"
            );
            match &self.vendor {
                None => {
                    for info in needed {
                        resolved.insert(info.symbol.clone(), mock_quote(info));
                    }
                }
                Some(vendor) => self.fetch_batches(vendor, &needed, &mut resolved).await,
            }
        }

        symbols
            .iter()
            .map(|info| match resolved.get(&info.symbol) {
                Some(q) => q.relabel(info, q.source),
                None => mock_quote(info),
            })
            .collect()
    }

    async fn fetch_batches(
        &self,
        vendor: &Arc<dyn MarketDataVendor>,
        needed: &[&SymbolInfo],
        resolved: &mut HashMap<String, Quote>,
    ) {
        for chunk in needed.chunks(self.config.batch_size) {
            // Re-checked per batch: the budget can run out mid-loop.
            if self.scheduler.is_over_daily_limit() {
                tracing::warn!(
                    remaining_symbols = chunk.len(),
                    "daily request budget exhausted, using mock quotes"
                );
                for info in chunk {
                    resolved.insert(info.symbol.clone(), mock_quote(info));
                }
                continue;
            }

            let batch: Vec<String> = chunk.iter().map(|i| i.symbol.clone()).collect();
            let mut rows = match self.scheduler.throttle(|| vendor.quotes(&batch)).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(batch = %batch.join(","), error = %e, "quote batch failed, using mock quotes");
                    for info in chunk {
                        resolved.insert(info.symbol.clone(), mock_quote(info));
                    }
                    continue;
                }
            };

            for info in chunk {
                let row = rows
                    .remove(&info.symbol)
                    .unwrap_or_else(|| Err(DataError::SymbolNotFound {
                        symbol: info.symbol.clone(),
                    }))
                    .and_then(|raw| {
                        if raw.is_valid() {
                            Ok(raw)
                        } else {
                            Err(DataError::Malformed(format!("invalid quote fields {raw:?}")))
                        }
                    });

                let quote = match row {
                    Ok(raw) => {
                        let q = Quote::from_info(
                            info,
                            raw.price,
                            raw.change,
                            raw.change_percent,
                            raw.volume,
                            DataSource::Live,
                        );
                        self.quote_cache()
                            .set(info.symbol.clone(), q.clone(), self.config.cache_ttl);
                        q
                    }
                    Err(e) => or_mock(Err(e), &info.symbol, || mock_quote(info)),
                };
                resolved.insert(info.symbol.clone(), quote);
            }
        }
    }

    /// `size` bars, oldest first.
    pub async fn get_candles(
        &self,
        symbol: &str,
        market: Market,
        interval: Interval,
        size: usize,
    ) -> Vec<CandleBar> {
        let fallback = || {
            let step = interval.seconds();
            let now = self.clock.now().timestamp();
            mock_candles(symbol, market, size, step, now - now.rem_euclid(step))
        };

        let Some(vendor) = self.live_vendor() else {
            return fallback();
        };

        let result = self
            .scheduler
            .throttle(|| vendor.time_series(symbol, interval, size))
            .await;

        let mut bars = or_mock(result, symbol, fallback);
        bars.sort_by_key(|b| b.time);
        bars.dedup_by_key(|b| b.time);
        bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_decision_table() {
        assert!(should_use_mock(false, false));
        assert!(should_use_mock(false, true));
        assert!(should_use_mock(true, true));
        assert!(!should_use_mock(true, false));
    }

    #[test]
    fn or_mock_passes_values_through() {
        assert_eq!(or_mock(Ok(3.0), "X", || 1.0), 3.0);
        assert_eq!(or_mock(Err(DataError::NotConfigured), "X", || 1.0), 1.0);
    }
}
