//! Kraken public API: asset pairs once, then all tickers in one call.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::{AdapterError, ExchangeAdapter, SymbolPolicy, Ticker, TickerMode};
use crate::domain::currency::{CurrencyPair, Symbol};
use crate::infrastructure::rest::RestClient;

use super::parse_amount;

#[derive(Debug, Deserialize)]
struct KrakenResponse<T> {
    #[serde(default)]
    error: Vec<String>,
    result: Option<T>,
}

impl<T> KrakenResponse<T> {
    fn into_result(self) -> Result<T, AdapterError> {
        if !self.error.is_empty() {
            return Err(AdapterError::Api {
                status: 200,
                message: self.error.join(", "),
            });
        }
        self.result
            .ok_or_else(|| AdapterError::Malformed("missing result".into()))
    }
}

#[derive(Debug, Deserialize)]
struct AssetPair {
    altname: String,
    wsname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TickerInfo {
    /// Last trade closed: `[price, lot volume]`.
    c: Vec<String>,
}

/// Kraken adapter.
#[derive(Debug)]
pub struct KrakenAdapter {
    client: RestClient,
}

impl KrakenAdapter {
    /// Create the adapter.
    #[must_use]
    pub const fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExchangeAdapter for KrakenAdapter {
    fn name(&self) -> &str {
        "kraken"
    }

    fn symbol_policy(&self) -> SymbolPolicy {
        SymbolPolicy::Cached
    }

    fn ticker_mode(&self) -> TickerMode {
        TickerMode::Bulk
    }

    fn has_balance_access(&self) -> bool {
        false
    }

    /// Kraken pair keys are `XXBTZUSD` (prefixed legs) or `XBTUSD`.
    fn split_symbol(&self, symbol: &str) -> Option<CurrencyPair> {
        if !symbol.is_ascii() || symbol.len() < 6 {
            return None;
        }
        let quote = &symbol[symbol.len() - 3..];
        let base = if symbol.len() == 8 && symbol.starts_with('X') {
            &symbol[1..4]
        } else {
            &symbol[..3]
        };
        CurrencyPair::new(base, quote)
    }

    async fn list_symbols(&self) -> Result<Vec<Symbol>, AdapterError> {
        let response: KrakenResponse<HashMap<String, AssetPair>> =
            self.client.get_json("/0/public/AssetPairs", &[]).await?;

        let mut symbols: Vec<Symbol> = response
            .into_result()?
            .into_iter()
            // Dark pool pairs have no public ticker.
            .filter(|(_, pair)| !pair.altname.ends_with(".d"))
            .map(|(key, pair)| {
                match pair.wsname.as_deref().and_then(|ws| CurrencyPair::split(ws, '/')) {
                    Some(legs) => Symbol::with_legs(key, legs.base(), legs.quote()),
                    None => Symbol::new(key),
                }
            })
            .collect();
        symbols.sort_by(|a, b| a.id().cmp(b.id()));

        Ok(symbols)
    }

    async fn fetch_tickers(&self, symbols: &[Symbol]) -> Result<Vec<Ticker>, AdapterError> {
        let pairs = symbols.iter().map(Symbol::id).collect::<Vec<_>>().join(",");
        let response: KrakenResponse<HashMap<String, TickerInfo>> = self
            .client
            .get_json("/0/public/Ticker", &[("pair", pairs.as_str())])
            .await?;

        Ok(response
            .into_result()?
            .into_iter()
            .filter_map(|(key, info)| {
                let price = parse_amount(info.c.first()?).ok()?;
                Some(Ticker::new(Symbol::new(key), price))
            })
            .collect())
    }
}
