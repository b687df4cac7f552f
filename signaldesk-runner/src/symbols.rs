//! Which symbols a pipeline run covers.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use signaldesk_core::domain::{default_universe, Market, SymbolInfo, UserId};

use crate::store::{RecordStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The user's saved watchlist.
    Watchlist,
    /// The built-in universe of one market.
    Market(Market),
    /// Every built-in universe.
    Global,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Watchlist => f.write_str("WATCHLIST"),
            Scope::Market(m) => write!(f, "{m}"),
            Scope::Global => f.write_str("GLOBAL"),
        }
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WATCHLIST" => Ok(Scope::Watchlist),
            "GLOBAL" | "ALL" => Ok(Scope::Global),
            other => other
                .parse::<Market>()
                .map(Scope::Market)
                .map_err(|_| format!("unknown scope '{s}' (watchlist, global or a market)")),
        }
    }
}

/// Resolve `scope` to symbols. Only the watchlist read can fail.
pub async fn load_symbols(
    scope: Scope,
    store: &dyn RecordStore,
    user: &UserId,
) -> Result<Vec<SymbolInfo>, StoreError> {
    Ok(match scope {
        Scope::Watchlist => store
            .watchlist(user)
            .await?
            .iter()
            .map(|e| e.to_symbol_info())
            .collect(),
        Scope::Market(m) => default_universe(m),
        Scope::Global => Market::ALL.iter().flat_map(|&m| default_universe(m)).collect(),
    })
}

/// Drop repeated symbols, ignoring ASCII case, keeping the first occurrence
/// and input order.
pub fn dedupe(symbols: Vec<SymbolInfo>) -> Vec<SymbolInfo> {
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .filter(|s| seen.insert(s.symbol.to_ascii_uppercase()))
        .collect()
}
