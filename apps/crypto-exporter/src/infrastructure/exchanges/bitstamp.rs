//! Bitstamp public API. Bitstamp has no bulk ticker endpoint, so prices are
//! fetched one pair at a time from a fixed pair list.

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::{AdapterError, ExchangeAdapter, SymbolPolicy, Ticker, TickerMode};
use crate::domain::currency::{CurrencyPair, Symbol};
use crate::infrastructure::rest::RestClient;

use super::Amount;

/// Pairs polled when no explicit list is configured.
const PAIRS: [&str; 15] = [
    "btcusd", "btceur", "eurusd", "xrpusd", "xrpeur", "xrpbtc", "ltcusd", "ltceur", "ltcbtc",
    "ethusd", "etheur", "ethbtc", "bchusd", "bcheur", "bchbtc",
];

#[derive(Debug, Deserialize)]
struct TickerResponse {
    last: Amount,
}

/// Bitstamp adapter.
#[derive(Debug)]
pub struct BitstampAdapter {
    client: RestClient,
}

impl BitstampAdapter {
    /// Create the adapter.
    #[must_use]
    pub const fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExchangeAdapter for BitstampAdapter {
    fn name(&self) -> &str {
        "bitstamp"
    }

    fn symbol_policy(&self) -> SymbolPolicy {
        SymbolPolicy::Cached
    }

    fn ticker_mode(&self) -> TickerMode {
        TickerMode::PerSymbol
    }

    fn has_balance_access(&self) -> bool {
        false
    }

    fn split_symbol(&self, symbol: &str) -> Option<CurrencyPair> {
        CurrencyPair::split_fixed(symbol, 3)
    }

    async fn list_symbols(&self) -> Result<Vec<Symbol>, AdapterError> {
        Ok(PAIRS.iter().map(|pair| Symbol::new(*pair)).collect())
    }

    async fn fetch_ticker(&self, symbol: &Symbol) -> Result<Ticker, AdapterError> {
        let path = format!("/v2/ticker/{}/", symbol.id().to_lowercase());
        let response: TickerResponse = self.client.get_json(&path, &[]).await?;
        Ok(Ticker::new(symbol.clone(), response.last.value()?))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn adapter(server: &MockServer) -> BitstampAdapter {
        BitstampAdapter::new(RestClient::new(&server.uri(), Duration::from_secs(2)).unwrap())
    }

    #[tokio::test]
    async fn static_pairs_split_into_legs() {
        let server = MockServer::start().await;
        let adapter = adapter(&server);

        let symbols = adapter.list_symbols().await.unwrap();
        assert_eq!(symbols.len(), 15);
        assert!(symbols.iter().all(|s| adapter.split_symbol(s.id()).is_some()));
        assert_eq!(adapter.split_symbol("xrpbtc"), CurrencyPair::new("XRP", "BTC"));
    }

    #[tokio::test]
    async fn fetches_one_ticker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/ticker/btcusd/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "high": "30500.00", "last": "30123.45", "timestamp": "1700000000",
                "bid": "30120.00", "vwap": "30200.11", "volume": "1234.5", "low": "29900.00",
                "ask": "30125.00", "open": "30000.00"
            })))
            .mount(&server)
            .await;

        let ticker = adapter(&server).fetch_ticker(&Symbol::new("btcusd")).await.unwrap();
        assert_eq!(ticker.symbol.id(), "btcusd");
        assert!((ticker.price - 30123.45).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn unknown_pair_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
            .mount(&server)
            .await;

        let result = adapter(&server).fetch_ticker(&Symbol::new("foobar")).await;
        assert!(matches!(result, Err(AdapterError::Api { status: 404, .. })));
    }
}
