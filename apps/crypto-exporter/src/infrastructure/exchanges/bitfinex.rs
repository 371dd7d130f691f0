//! Bitfinex v2 API: every trading ticker in one call; wallets through the
//! authenticated endpoint.

use async_trait::async_trait;
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

/// Position of the last price in a trading ticker array.
const LAST_PRICE: usize = 7;

/// Wallet array: `[type, currency, balance, unsettled interest, available, ...]`.
const WALLET_TYPE: usize = 0;
const WALLET_CURRENCY: usize = 1;
const WALLET_BALANCE: usize = 2;
const WALLET_AVAILABLE: usize = 4;

const WALLETS_PATH: &str = "/v2/auth/r/wallets";

#[derive(Debug)]
struct Auth {
    api_key: String,
    signer: RequestSigner,
}

/// Bitfinex adapter.
#[derive(Debug)]
pub struct BitfinexAdapter {
    client: RestClient,
    auth: Option<Auth>,
    nonces: NonceSource,
}

impl BitfinexAdapter {
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
                    HmacAlgorithm::Sha384,
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

fn as_f64(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

/// Bitfinex reports auth failures as `["error", 10100, "apikey: invalid"]`,
/// often with a 500 status.
fn classify_error(error: AdapterError) -> AdapterError {
    match error {
        AdapterError::Transient(message) | AdapterError::Api { message, .. }
            if message.contains("apikey") || message.contains("10100") =>
        {
            AdapterError::Unauthorized(message)
        }
        other => other,
    }
}

#[async_trait]
impl ExchangeAdapter for BitfinexAdapter {
    fn name(&self) -> &str {
        "bitfinex"
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

    /// `tBTCUSD` or `tTESTBTC:TESTUSD`.
    fn split_symbol(&self, symbol: &str) -> Option<CurrencyPair> {
        let pair = symbol.strip_prefix('t')?;
        if pair.contains(':') {
            CurrencyPair::split(pair, ':')
        } else {
            CurrencyPair::split_fixed(pair, 3)
        }
    }

    async fn fetch_tickers(&self, _symbols: &[Symbol]) -> Result<Vec<Ticker>, AdapterError> {
        let rows: Vec<Vec<Value>> = self
            .client
            .get_json("/v2/tickers", &[("symbols", "ALL")])
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let symbol = row.first()?.as_str()?;
                // Funding tickers (`f...`) have a different layout.
                if !symbol.starts_with('t') {
                    return None;
                }
                let price = as_f64(row.get(LAST_PRICE))?;
                Some(Ticker::new(Symbol::new(symbol), price))
            })
            .collect())
    }

    async fn fetch_balances(&self) -> Result<Vec<Balance>, AdapterError> {
        let Some(auth) = &self.auth else {
            return Err(AdapterError::Unsupported("fetch_balances"));
        };

        let nonce = self.nonces.next().to_string();
        let body = "{}";
        let signature = auth
            .signer
            .sign(format!("/api{WALLETS_PATH}{nonce}{body}").as_bytes());

        let request = self
            .client
            .post(WALLETS_PATH)
            .header("bfx-nonce", &nonce)
            .header("bfx-apikey", &auth.api_key)
            .header("bfx-signature", signature)
            .header("content-type", "application/json")
            .body(body);
        let wallets: Vec<Vec<Value>> = self
            .client
            .send_json(request)
            .await
            .map_err(classify_error)?;

        wallets
            .into_iter()
            .map(|wallet| {
                let wallet_type = wallet.get(WALLET_TYPE).and_then(Value::as_str);
                let currency = wallet.get(WALLET_CURRENCY).and_then(Value::as_str);
                let (Some(wallet_type), Some(currency)) = (wallet_type, currency) else {
                    return Err(AdapterError::Malformed(format!("unexpected wallet: {wallet:?}")));
                };
                let total = as_f64(wallet.get(WALLET_BALANCE)).unwrap_or(0.0);
                // Available is null until the wallet has been recalculated.
                let free = as_f64(wallet.get(WALLET_AVAILABLE)).unwrap_or(total);
                let used = (total - free).max(0.0);
                Ok(Balance::new(currency, free, used).in_account(wallet_type))
            })
            .collect()
    }
}
