//! HitBTC v2 API. Private endpoints use HTTP basic auth with key and secret.

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::{
    AdapterError, Balance, ExchangeAdapter, SymbolPolicy, Ticker, TickerMode,
};
use crate::domain::currency::Symbol;
use crate::infrastructure::config::ExchangeCredentials;
use crate::infrastructure::rest::RestClient;

use super::{Amount, amount_or_zero};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    id: String,
    base_currency: String,
    quote_currency: String,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    symbol: String,
    last: Option<Amount>,
}

#[derive(Debug, Deserialize)]
struct TradingBalance {
    currency: String,
    available: Option<Amount>,
    reserved: Option<Amount>,
}

/// HitBTC adapter.
#[derive(Debug)]
pub struct HitbtcAdapter {
    client: RestClient,
    credentials: Option<ExchangeCredentials>,
}

impl HitbtcAdapter {
    /// Create the adapter.
    #[must_use]
    pub fn new(client: RestClient, credentials: Option<&ExchangeCredentials>) -> Self {
        Self {
            client,
            credentials: credentials.cloned(),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for HitbtcAdapter {
    fn name(&self) -> &str {
        "hitbtc"
    }

    fn symbol_policy(&self) -> SymbolPolicy {
        SymbolPolicy::Cached
    }

    fn ticker_mode(&self) -> TickerMode {
        TickerMode::Bulk
    }

    fn has_balance_access(&self) -> bool {
        self.credentials.is_some()
    }

    async fn list_symbols(&self) -> Result<Vec<Symbol>, AdapterError> {
        let symbols: Vec<SymbolInfo> = self.client.get_json("/api/2/public/symbol", &[]).await?;
        Ok(symbols
            .into_iter()
            .map(|s| Symbol::with_legs(s.id, s.base_currency, s.quote_currency))
            .collect())
    }

    async fn fetch_tickers(&self, _symbols: &[Symbol]) -> Result<Vec<Ticker>, AdapterError> {
        let tickers: Vec<TickerEntry> = self.client.get_json("/api/2/public/ticker", &[]).await?;
        // Markets without trades report `last: null`.
        Ok(tickers
            .into_iter()
            .filter_map(|t| {
                let price = t.last?.value().ok()?;
                Some(Ticker::new(Symbol::new(t.symbol), price))
            })
            .collect())
    }

    async fn fetch_balances(&self) -> Result<Vec<Balance>, AdapterError> {
        let Some(creds) = &self.credentials else {
            return Err(AdapterError::Unsupported("fetch_balances"));
        };

        let request = self
            .client
            .get("/api/2/trading/balance")
            .basic_auth(creds.api_key(), Some(creds.api_secret()));
        let balances: Vec<TradingBalance> = self.client.send_json(request).await?;

        balances
            .into_iter()
            .map(|b| {
                Ok(Balance::new(
                    b.currency,
                    amount_or_zero(b.available.as_ref())?,
                    amount_or_zero(b.reserved.as_ref())?,
                ))
            })
            .collect()
    }
}
