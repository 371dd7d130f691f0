//! Quoine (Liquid) API. Products carry their own price; private calls are
//! authenticated with an HS256 JWT in `X-Quoine-Auth`.

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::{
    AdapterError, Balance, ExchangeAdapter, SymbolPolicy, Ticker, TickerMode,
};
use crate::domain::currency::Symbol;
use crate::infrastructure::config::ExchangeCredentials;
use crate::infrastructure::rest::RestClient;
use crate::infrastructure::signing::{NonceSource, NonceUnit, jwt_hs256};

use super::Amount;

const API_VERSION: &str = "2";
const BALANCE_PATH: &str = "/accounts/balance";

#[derive(Debug, Deserialize)]
struct Product {
    currency_pair_code: String,
    base_currency: String,
    quoted_currency: String,
    last_traded_price: Option<Amount>,
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    currency: String,
    balance: Amount,
}

/// Quoine adapter.
#[derive(Debug)]
pub struct QuoineAdapter {
    client: RestClient,
    credentials: Option<ExchangeCredentials>,
    nonces: NonceSource,
}

impl QuoineAdapter {
    /// Create the adapter.
    #[must_use]
    pub fn new(client: RestClient, credentials: Option<&ExchangeCredentials>) -> Self {
        Self {
            client,
            credentials: credentials.cloned(),
            nonces: NonceSource::new(NonceUnit::Millis),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for QuoineAdapter {
    fn name(&self) -> &str {
        "quoine"
    }

    fn symbol_policy(&self) -> SymbolPolicy {
        SymbolPolicy::Fused
    }

    fn ticker_mode(&self) -> TickerMode {
        TickerMode::Bulk
    }

    fn has_balance_access(&self) -> bool {
        self.credentials.is_some()
    }

    async fn fetch_tickers(&self, _symbols: &[Symbol]) -> Result<Vec<Ticker>, AdapterError> {
        let products: Vec<Product> = self.client.get_json("/products", &[]).await?;
        Ok(products
            .into_iter()
            .filter_map(|p| {
                let price = p.last_traded_price?.value().ok()?;
                let symbol =
                    Symbol::with_legs(p.currency_pair_code, p.base_currency, p.quoted_currency);
                Some(Ticker::new(symbol, price))
            })
            .collect())
    }

    async fn fetch_balances(&self) -> Result<Vec<Balance>, AdapterError> {
        let Some(creds) = &self.credentials else {
            return Err(AdapterError::Unsupported("fetch_balances"));
        };

        let claims = serde_json::json!({
            "path": BALANCE_PATH,
            "nonce": self.nonces.next(),
            "token_id": creds.api_key(),
        });
        let token = jwt_hs256(&claims, creds.api_secret());

        let request = self
            .client
            .get(BALANCE_PATH)
            .header("X-Quoine-API-Version", API_VERSION)
            .header("X-Quoine-Auth", token)
            .header("content-type", "application/json");
        let balances: Vec<AccountBalance> = self.client.send_json(request).await?;

        // Quoine does not report amounts held in orders.
        balances
            .into_iter()
            .map(|b| Ok(Balance::new(b.currency, b.balance.value()?, 0.0)))
            .collect()
    }
}
