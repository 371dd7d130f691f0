//! Binance spot API: exchange info once, all prices in one call, signed
//! account endpoint for balances.

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::{
    AdapterError, Balance, ExchangeAdapter, SymbolPolicy, Ticker, TickerMode,
};
use crate::domain::currency::Symbol;
use crate::infrastructure::config::ExchangeCredentials;
use crate::infrastructure::rest::RestClient;
use crate::infrastructure::signing::{
    HmacAlgorithm, NonceSource, NonceUnit, RequestSigner, SecretEncoding, SignatureEncoding,
    SigningError,
};

use super::Amount;

const RECV_WINDOW_MS: u32 = 5000;

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    status: String,
    base_asset: String,
    quote_asset: String,
}

#[derive(Debug, Deserialize)]
struct PriceTicker {
    symbol: String,
    price: Amount,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
struct AssetBalance {
    asset: String,
    free: Amount,
    locked: Amount,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
}

/// Error codes for a bad key, signature, or permission set.
const AUTH_ERROR_CODES: [i64; 3] = [-1022, -2014, -2015];

/// Binance rejects bad keys with HTTP 400 and a coded body.
fn classify_error(error: AdapterError) -> AdapterError {
    match error {
        AdapterError::Api { message, .. }
            if serde_json::from_str::<ErrorBody>(&message)
                .is_ok_and(|body| AUTH_ERROR_CODES.contains(&body.code)) =>
        {
            AdapterError::Unauthorized(message)
        }
        other => other,
    }
}

#[derive(Debug)]
struct Auth {
    api_key: String,
    signer: RequestSigner,
}

/// Binance adapter.
#[derive(Debug)]
pub struct BinanceAdapter {
    client: RestClient,
    auth: Option<Auth>,
    timestamps: NonceSource,
}

impl BinanceAdapter {
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
                    HmacAlgorithm::Sha256,
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
            timestamps: NonceSource::new(NonceUnit::Millis),
        })
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    fn name(&self) -> &str {
        "binance"
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

    async fn list_symbols(&self) -> Result<Vec<Symbol>, AdapterError> {
        let info: ExchangeInfo = self.client.get_json("/api/v3/exchangeInfo", &[]).await?;
        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(|s| Symbol::with_legs(s.symbol, s.base_asset, s.quote_asset))
            .collect())
    }

    async fn fetch_tickers(&self, _symbols: &[Symbol]) -> Result<Vec<Ticker>, AdapterError> {
        let prices: Vec<PriceTicker> = self.client.get_json("/api/v3/ticker/price", &[]).await?;
        Ok(prices
            .into_iter()
            .filter_map(|p| {
                let price = p.price.value().ok()?;
                Some(Ticker::new(Symbol::new(p.symbol), price))
            })
            .collect())
    }

    async fn fetch_balances(&self) -> Result<Vec<Balance>, AdapterError> {
        let Some(auth) = &self.auth else {
            return Err(AdapterError::Unsupported("fetch_balances"));
        };

        let query = format!(
            "recvWindow={RECV_WINDOW_MS}&timestamp={}",
            self.timestamps.next()
        );
        let signature = auth.signer.sign(query.as_bytes());
        let path = format!("/api/v3/account?{query}&signature={signature}");

        let request = self
            .client
            .get(&path)
            .header("X-MBX-APIKEY", &auth.api_key);
        let account: AccountInfo = self
            .client
            .send_json(request)
            .await
            .map_err(classify_error)?;

        account
            .balances
            .into_iter()
            .map(|b| Ok(Balance::new(b.asset, b.free.value()?, b.locked.value()?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use wiremock::matchers::{header, method, path, query_param_contains};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::application::services::{BalanceAccess, PollCycle, PollSettings, RetryConfig};
    use crate::domain::currency::CurrencyPair;

    fn adapter(server: &MockServer, creds: bool) -> BinanceAdapter {
        let credentials = ExchangeCredentials::new("mbx-key".into(), "mbx-secret".into());
        BinanceAdapter::new(
            RestClient::new(&server.uri(), Duration::from_secs(2)).unwrap(),
            creds.then_some(&credentials),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn lists_trading_symbols() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/exchangeInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "timezone": "UTC",
                "symbols": [
                    {"symbol": "ETHBTC", "status": "TRADING", "baseAsset": "ETH", "quoteAsset": "BTC"},
                    {"symbol": "OLDBTC", "status": "BREAK", "baseAsset": "OLD", "quoteAsset": "BTC"}
                ]
            })))
            .mount(&server)
            .await;

        let symbols = adapter(&server, false).list_symbols().await.unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].pair(), CurrencyPair::new("ETH", "BTC"));
    }

    #[tokio::test]
    async fn fetches_all_prices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/price"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"symbol": "ETHBTC", "price": "0.06250000"},
                {"symbol": "LTCBTC", "price": "0.00310000"}
            ])))
            .mount(&server)
            .await;

        let adapter = adapter(&server, false);
        let tickers = adapter.fetch_tickers(&[]).await.unwrap();
        assert_eq!(tickers.len(), 2);
        assert!((tickers[0].price - 0.0625).abs() < f64::EPSILON);
        assert_eq!(adapter.split_symbol("ETHBTC"), None);
    }

    #[tokio::test]
    async fn signed_account_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/account"))
            .and(header("X-MBX-APIKEY", "mbx-key"))
            .and(query_param_contains("signature", ""))
            .and(query_param_contains("recvWindow", "5000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "makerCommission": 15,
                "balances": [
                    {"asset": "BTC", "free": "4723846.89208129", "locked": "0.00000000"},
                    {"asset": "LTC", "free": "4763368.68006011", "locked": "1.50000000"}
                ]
            })))
            .mount(&server)
            .await;

        let balances = adapter(&server, true).fetch_balances().await.unwrap();
        assert_eq!(balances[1], Balance::new("LTC", 4_763_368.680_060_11, 1.5));
    }

    #[tokio::test]
    async fn invalid_key_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/account"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "code": -2015, "msg": "Invalid API-key, IP, or permissions for action."
            })))
            .mount(&server)
            .await;

        let result = adapter(&server, true).fetch_balances().await;
        assert!(result.unwrap_err().is_unauthorized());
    }

    #[tokio::test]
    async fn coded_auth_rejections_are_unauthorized() {
        for code in AUTH_ERROR_CODES {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/v3/account"))
                .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                    "code": code, "msg": "Signature for this request is not valid."
                })))
                .mount(&server)
                .await;

            let result = adapter(&server, true).fetch_balances().await;
            assert!(result.unwrap_err().is_unauthorized(), "code {code}");
        }
    }

    #[tokio::test]
    async fn other_coded_errors_stay_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/account"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": -1021, "msg": "Timestamp for this request is outside of the recvWindow."
            })))
            .mount(&server)
            .await;

        let result = adapter(&server, true).fetch_balances().await;
        assert!(matches!(result, Err(AdapterError::Api { status: 400, .. })));
    }

    #[tokio::test]
    async fn bad_signature_stops_balance_polling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/account"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": -1022, "msg": "Signature for this request is not valid."
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/exchangeInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "symbols": []
            })))
            .mount(&server)
            .await;

        let settings = PollSettings {
            symbol_retry: RetryConfig::fixed(Duration::ZERO, 1),
            ..PollSettings::new("binance")
        };
        let mut cycle = PollCycle::new(Arc::new(adapter(&server, true)), settings);

        cycle.collect().await;
        cycle.collect().await;

        assert_eq!(cycle.balance_access(), BalanceAccess::Disabled);
    }
}
