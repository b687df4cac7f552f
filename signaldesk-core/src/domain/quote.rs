use super::market::{Market, SymbolInfo};
use serde::{Deserialize, Serialize};

/// Where a quote or price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Live,
    Cache,
    Mock,
}

/// Immutable market snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub market: Market,
    pub currency: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: u64,
    pub source: DataSource,
}

impl Quote {
    /// Build a quote carrying the caller's display metadata.
    pub fn from_info(
        info: &SymbolInfo,
        price: f64,
        change: f64,
        change_percent: f64,
        volume: u64,
        source: DataSource,
    ) -> Self {
        Self {
            symbol: info.symbol.clone(),
            name: info.name.clone(),
            market: info.market,
            currency: info.currency.clone(),
            price,
            change,
            change_percent,
            volume,
            source,
        }
    }

    /// Same snapshot with different metadata and source tag.
    pub fn relabel(&self, info: &SymbolInfo, source: DataSource) -> Self {
        Self::from_info(
            info,
            self.price,
            self.change,
            self.change_percent,
            self.volume,
            source,
        )
    }

    pub fn is_mock(&self) -> bool {
        self.source == DataSource::Mock
    }
}
