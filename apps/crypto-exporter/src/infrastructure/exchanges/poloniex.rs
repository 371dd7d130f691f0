//! Poloniex legacy public and trading API.
//!
//! Market keys are `QUOTE_BASE` (`BTC_ETH` is ETH priced in BTC). Private
//! calls are form-encoded POSTs signed with hex HMAC-SHA512 over the body.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::application::ports::{
    AdapterError, Balance, ExchangeAdapter, SymbolPolicy, Ticker, TickerMode,
};
use crate::domain::currency::{CurrencyPair, Symbol};
use crate::infrastructure::config::ExchangeCredentials;
use crate::infrastructure::rest::RestClient;
use crate::infrastructure::signing::{
    HmacAlgorithm, NonceSource, NonceUnit, RequestSigner, SecretEncoding, SignatureEncoding,
    SigningError,
};

use super::{Amount, amount_or_zero};

#[derive(Debug, Deserialize)]
struct MarketTicker {
    last: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteBalance {
    available: Option<Amount>,
    on_orders: Option<Amount>,
}

#[derive(Debug)]
struct Auth {
    api_key: String,
    signer: RequestSigner,
}

/// Poloniex adapter.
#[derive(Debug)]
pub struct PoloniexAdapter {
    client: RestClient,
    auth: Option<Auth>,
    nonces: NonceSource,
}

impl PoloniexAdapter {
    /// Create the adapter.
    ///
    /// # Errors
    ///
    /// Never fails for raw secrets; kept fallible like the other signers.
    pub fn new(
        client: RestClient,
        credentials: Option<&ExchangeCredentials>,
    ) -> Result<Self, SigningError> {
        let auth = credentials
            .map(|creds| {
                RequestSigner::new(
                    creds.api_secret(),
                    SecretEncoding::Raw,
                    HmacAlgorithm::Sha512,
                    SignatureEncoding::Hex,
                )
                .map(|signer| Auth {
                    api_key: creds.api_key().to_string(),
                    signer,
                })
            })
            .transpose()?;

        Ok(Self {
            client,
            auth,
            nonces: NonceSource::new(NonceUnit::Millis),
        })
    }
}

/// Poloniex answers errors with `{"error": "..."}`, sometimes with a 200.
fn check_error(body: &Value) -> Result<(), AdapterError> {
    let Some(message) = body.get("error").and_then(Value::as_str) else {
        return Ok(());
    };
    let lower = message.to_lowercase();
    if lower.contains("api key") || lower.contains("signature") {
        Err(AdapterError::Unauthorized(message.to_string()))
    } else {
        Err(AdapterError::Api {
            status: 200,
            message: message.to_string(),
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, AdapterError> {
    check_error(&body)?;
    serde_json::from_value(body).map_err(|e| AdapterError::Malformed(e.to_string()))
}

#[async_trait]
impl ExchangeAdapter for PoloniexAdapter {
    fn name(&self) -> &str {
        "poloniex"
    }

    fn symbol_policy(&self) -> SymbolPolicy {
        SymbolPolicy::Fused
    }

    fn ticker_mode(&self) -> TickerMode {
        TickerMode::Bulk
    }

    fn has_balance_access(&self) -> bool {
        self.auth.is_some()
    }

    async fn fetch_tickers(&self, _symbols: &[Symbol]) -> Result<Vec<Ticker>, AdapterError> {
        let body: Value = self
            .client
            .get_json("/public", &[("command", "returnTicker")])
            .await?;
        let markets: BTreeMap<String, MarketTicker> = decode(body)?;

        Ok(markets
            .into_iter()
            .filter_map(|(key, market)| {
                // The left leg of a market key is the quote.
                let legs = CurrencyPair::split(&key, '_')?;
                let symbol = Symbol::with_legs(key.as_str(), legs.quote(), legs.base());
                let price = market.last.value().ok()?;
                Some(Ticker::new(symbol, price))
            })
            .collect())
    }

    async fn fetch_balances(&self) -> Result<Vec<Balance>, AdapterError> {
        let Some(auth) = &self.auth else {
            return Err(AdapterError::Unsupported("fetch_balances"));
        };

        let body = format!("command=returnCompleteBalances&nonce={}", self.nonces.next());
        let signature = auth.signer.sign(body.as_bytes());

        let request = self
            .client
            .post("/tradingApi")
            .header("Key", &auth.api_key)
            .header("Sign", signature)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body);
        let response: Value = self.client.send_json(request).await?;
        let balances: BTreeMap<String, CompleteBalance> = decode(response)?;

        balances
            .into_iter()
            .map(|(currency, balance)| {
                Ok(Balance::new(
                    currency,
                    amount_or_zero(balance.available.as_ref())?,
                    amount_or_zero(balance.on_orders.as_ref())?,
                ))
            })
            .collect()
    }
}
