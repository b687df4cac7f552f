//! Market data: vendor access, pacing, caching and mock fallback.

pub mod client;
pub mod mock;
pub mod provider;
pub mod scheduler;
pub mod ttl_cache;
pub mod twelve_data;

pub use client::{or_mock, should_use_mock, MarketDataClient, MarketDataConfig};
pub use mock::{mock_candles, mock_price, mock_quote};
pub use provider::{DataError, Interval, MarketDataVendor, QuoteBatch, RawQuote};
pub use scheduler::{BudgetSnapshot, RequestScheduler, SchedulerConfig};
pub use ttl_cache::TtlCache;
pub use twelve_data::TwelveDataVendor;
