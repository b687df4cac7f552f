//! Market categories and the built-in symbol universe.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Market category of a tradable symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Market {
    /// US equities.
    Us,
    /// Borsa Istanbul equities.
    Tr,
    Crypto,
    Commodity,
    Index,
}

impl Market {
    pub const ALL: [Market; 5] = [
        Market::Us,
        Market::Tr,
        Market::Crypto,
        Market::Commodity,
        Market::Index,
    ];

    pub fn default_currency(self) -> &'static str {
        match self {
            Market::Tr => "TRY",
            _ => "USD",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Market::Us => "US",
            Market::Tr => "TR",
            Market::Crypto => "CRYPTO",
            Market::Commodity => "COMMODITY",
            Market::Index => "INDEX",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "US" => Ok(Market::Us),
            "TR" | "BIST" => Ok(Market::Tr),
            "CRYPTO" => Ok(Market::Crypto),
            "COMMODITY" | "COMMODITIES" => Ok(Market::Commodity),
            "INDEX" | "INDICES" => Ok(Market::Index),
            other => Err(format!("unknown market '{other}'")),
        }
    }
}

/// A symbol plus the display metadata the access layer must echo back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub name: String,
    pub market: Market,
    pub currency: String,
}

impl SymbolInfo {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, market: Market) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            market,
            currency: market.default_currency().to_string(),
        }
    }
}

const US: &[(&str, &str)] = &[
    ("AAPL", "Apple Inc."),
    ("MSFT", "Microsoft Corporation"),
    ("GOOGL", "Alphabet Inc."),
    ("AMZN", "Amazon.com Inc."),
    ("NVDA", "NVIDIA Corporation"),
    ("META", "Meta Platforms Inc."),
    ("TSLA", "Tesla Inc."),
    ("JPM", "JPMorgan Chase & Co."),
    ("V", "Visa Inc."),
    ("WMT", "Walmart Inc."),
];

const TR: &[(&str, &str)] = &[
    ("THYAO", "Türk Hava Yolları"),
    ("GARAN", "Garanti BBVA"),
    ("AKBNK", "Akbank"),
    ("ASELS", "Aselsan"),
    ("BIMAS", "BİM Mağazalar"),
    ("EREGL", "Ereğli Demir Çelik"),
    ("KCHOL", "Koç Holding"),
    ("SISE", "Şişecam"),
    ("TUPRS", "Tüpraş"),
    ("YKBNK", "Yapı Kredi Bankası"),
];

const CRYPTO: &[(&str, &str)] = &[
    ("BTC/USD", "Bitcoin"),
    ("ETH/USD", "Ethereum"),
    ("BNB/USD", "BNB"),
    ("SOL/USD", "Solana"),
    ("XRP/USD", "XRP"),
    ("ADA/USD", "Cardano"),
    ("DOGE/USD", "Dogecoin"),
    ("AVAX/USD", "Avalanche"),
];

const COMMODITY: &[(&str, &str)] = &[
    ("XAU/USD", "Gold"),
    ("XAG/USD", "Silver"),
    ("WTI/USD", "Crude Oil WTI"),
    ("XBR/USD", "Brent Crude"),
    ("NG/USD", "Natural Gas"),
];

const INDEX: &[(&str, &str)] = &[
    ("SPX", "S&P 500"),
    ("NDX", "Nasdaq 100"),
    ("DJI", "Dow Jones Industrial Average"),
    ("XU100", "BIST 100"),
    ("DAX", "DAX 40"),
    ("FTSE", "FTSE 100"),
];

/// The built-in symbol list for one market.
pub fn default_universe(market: Market) -> Vec<SymbolInfo> {
    let rows = match market {
        Market::Us => US,
        Market::Tr => TR,
        Market::Crypto => CRYPTO,
        Market::Commodity => COMMODITY,
        Market::Index => INDEX,
    };
    rows.iter()
        .map(|(symbol, name)| {
            let mut info = SymbolInfo::new(*symbol, *name, market);
            if *symbol == "XU100" {
                info.currency = "TRY".to_string();
            }
            info
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_round_trips_through_str() {
        for m in Market::ALL {
            assert_eq!(m.as_str().parse::<Market>().unwrap(), m);
        }
        assert!("FOREX".parse::<Market>().is_err());
    }

    #[test]
    fn serde_uses_upper_case() {
        let json = serde_json::to_string(&Market::Commodity).unwrap();
        assert_eq!(json, "\"COMMODITY\"");
    }

    #[test]
    fn universe_sizes() {
        assert_eq!(default_universe(Market::Us).len(), 10);
        assert_eq!(default_universe(Market::Tr).len(), 10);
        assert_eq!(default_universe(Market::Crypto).len(), 8);
        assert_eq!(default_universe(Market::Commodity).len(), 5);
        assert_eq!(default_universe(Market::Index).len(), 6);
    }

    #[test]
    fn turkish_symbols_priced_in_lira() {
        assert!(default_universe(Market::Tr).iter().all(|s| s.currency == "TRY"));
        let xu100 = default_universe(Market::Index)
            .into_iter()
            .find(|s| s.symbol == "XU100")
            .unwrap();
        assert_eq!(xu100.currency, "TRY");
    }
}
