//! CEX.IO API. Markets come from the currency limits once; tickers for every
//! quote currency among them come back in one call. The balance call needs
//! the account user id as well as key and secret.

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
struct LimitsResponse {
    data: Option<LimitsData>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LimitsData {
    pairs: Vec<PairLimits>,
}

#[derive(Debug, Deserialize)]
struct PairLimits {
    symbol1: String,
    symbol2: String,
}

#[derive(Debug, Deserialize)]
struct TickersResponse {
    #[serde(default)]
    data: Vec<TickerEntry>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    pair: String,
    last: Option<Amount>,
}

#[derive(Debug, Deserialize)]
struct CurrencyBalance {
    available: Option<Amount>,
    orders: Option<Amount>,
}

#[derive(Debug)]
struct Auth {
    api_key: String,
    uid: String,
    signer: RequestSigner,
}

/// CEX.IO adapter.
#[derive(Debug)]
pub struct CexAdapter {
    client: RestClient,
    auth: Option<Auth>,
    nonces: NonceSource,
}

impl CexAdapter {
    /// Create the adapter. Balances stay disabled without a uid.
    ///
    /// # Errors
    ///
    /// Never fails for raw secrets; kept fallible like the other signers.
    pub fn new(
        client: RestClient,
        credentials: Option<&ExchangeCredentials>,
    ) -> Result<Self, SigningError> {
        let auth = credentials
            .and_then(|creds| creds.uid().map(|uid| (creds, uid)))
            .map(|(creds, uid)| {
                RequestSigner::new(
                    creds.api_secret(),
                    SecretEncoding::Raw,
                    HmacAlgorithm::Sha256,
                    SignatureEncoding::HexUpper,
                )
                .map(|signer| Auth {
                    api_key: creds.api_key().to_string(),
                    uid: uid.to_string(),
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

fn error_from_message(message: &str) -> AdapterError {
    let lower = message.to_lowercase();
    if ["key", "signature", "permission"]
        .iter()
        .any(|word| lower.contains(word))
    {
        AdapterError::Unauthorized(message.to_string())
    } else {
        AdapterError::Api {
            status: 200,
            message: message.to_string(),
        }
    }
}

/// Distinct quote currencies of the markets, in listing order.
fn quote_path(symbols: &[Symbol]) -> String {
    let mut quotes: Vec<String> = Vec::new();
    let pairs = symbols
        .iter()
        .filter_map(|symbol| symbol.pair().or_else(|| CurrencyPair::split(symbol.id(), ':')));
    for pair in pairs {
        if !quotes.iter().any(|quote| quote == pair.quote()) {
            quotes.push(pair.quote().to_string());
        }
    }
    quotes.join("/")
}

#[async_trait]
impl ExchangeAdapter for CexAdapter {
    fn name(&self) -> &str {
        "cex"
    }

    fn symbol_policy(&self) -> SymbolPolicy {
        SymbolPolicy::Cached
    }

    fn ticker_mode(&self) -> TickerMode {
        TickerMode::Bulk
    }

    fn has_balance_access(&self) -> bool {
        self.auth.is_some()
    }

    fn split_symbol(&self, symbol: &str) -> Option<CurrencyPair> {
        CurrencyPair::split(symbol, ':')
    }

    async fn list_symbols(&self) -> Result<Vec<Symbol>, AdapterError> {
        let response: LimitsResponse = self.client.get_json("/currency_limits", &[]).await?;
        if let Some(error) = response.error {
            return Err(error_from_message(&error));
        }
        let data = response
            .data
            .ok_or_else(|| AdapterError::Malformed("currency limits without data".into()))?;

        Ok(data
            .pairs
            .into_iter()
            .map(|p| {
                let id = format!("{}:{}", p.symbol1, p.symbol2);
                Symbol::with_legs(id, p.symbol1, p.symbol2)
            })
            .collect())
    }

    async fn fetch_tickers(&self, symbols: &[Symbol]) -> Result<Vec<Ticker>, AdapterError> {
        let path = format!("/tickers/{}", quote_path(symbols));
        let response: TickersResponse = self.client.get_json(&path, &[]).await?;
        if let Some(error) = response.error {
            return Err(error_from_message(&error));
        }

        Ok(response
            .data
            .into_iter()
            .filter_map(|entry| {
                let price = entry.last?.value().ok()?;
                Some(Ticker::new(Symbol::new(entry.pair), price))
            })
            .collect())
    }

    async fn fetch_balances(&self) -> Result<Vec<Balance>, AdapterError> {
        let Some(auth) = &self.auth else {
            return Err(AdapterError::Unsupported("fetch_balances"));
        };

        let nonce = self.nonces.next().to_string();
        let signature = auth
            .signer
            .sign(format!("{nonce}{}{}", auth.uid, auth.api_key).as_bytes());
        let payload = serde_json::json!({
            "key": auth.api_key,
            "signature": signature,
            "nonce": nonce,
        });

        let request = self.client.post("/balance/").json(&payload);
        let response: serde_json::Map<String, Value> = self.client.send_json(request).await?;

        if let Some(error) = response.get("error").and_then(Value::as_str) {
            return Err(error_from_message(error));
        }

        // Currency entries are objects; `timestamp` and `username` are not.
        response
            .into_iter()
            .filter(|(_, value)| value.is_object())
            .map(|(currency, value)| {
                let balance: CurrencyBalance = serde_json::from_value(value)
                    .map_err(|e| AdapterError::Malformed(e.to_string()))?;
                Ok(Balance::new(
                    currency,
                    amount_or_zero(balance.available.as_ref())?,
                    amount_or_zero(balance.orders.as_ref())?,
                ))
            })
            .collect()
    }
}
