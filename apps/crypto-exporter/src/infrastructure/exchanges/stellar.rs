//! Stellar Horizon: balances of public Stellar accounts. The native asset
//! is reported as XLM; issued assets by their asset code.

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::{
    AdapterError, Balance, ExchangeAdapter, SymbolPolicy, TickerMode,
};
use crate::infrastructure::rest::RestClient;

use super::{Amount, merge_address_results};

#[derive(Debug, Deserialize)]
struct Account {
    balances: Vec<AccountBalance>,
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    balance: Amount,
    asset_type: String,
    asset_code: Option<String>,
}

impl AccountBalance {
    fn currency(&self) -> &str {
        match (self.asset_code.as_deref(), self.asset_type.as_str()) {
            (Some(code), _) => code,
            (None, "native") => "XLM",
            (None, other) => other,
        }
    }
}

/// Stellar adapter.
#[derive(Debug)]
pub struct StellarAdapter {
    client: RestClient,
    addresses: Vec<String>,
}

impl StellarAdapter {
    /// Create the adapter.
    #[must_use]
    pub const fn new(client: RestClient, addresses: Vec<String>) -> Self {
        Self { client, addresses }
    }

    async fn account_balances(&self, address: &str) -> Result<Vec<Balance>, AdapterError> {
        let account: Account = self
            .client
            .get_json(&format!("/accounts/{address}"), &[])
            .await?;

        account
            .balances
            .iter()
            .map(|b| Ok(Balance::new(b.currency(), b.balance.value()?, 0.0).in_account(address)))
            .collect()
    }
}

#[async_trait]
impl ExchangeAdapter for StellarAdapter {
    fn name(&self) -> &str {
        "stellar"
    }

    fn symbol_policy(&self) -> SymbolPolicy {
        SymbolPolicy::None
    }

    fn ticker_mode(&self) -> TickerMode {
        TickerMode::Unsupported
    }

    fn has_balance_access(&self) -> bool {
        !self.addresses.is_empty()
    }

    async fn fetch_balances(&self) -> Result<Vec<Balance>, AdapterError> {
        let mut results = Vec::with_capacity(self.addresses.len());
        for address in &self.addresses {
            results.push((address.clone(), self.account_balances(address).await));
        }
        merge_address_results(self.name(), results)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const ACCOUNT: &str = "GCEZWKCA5VLDNRLN3RPRJMRZOX3Z6G5CHCGSNFHEYVXM3XOJMDS674JZ";

    #[tokio::test]
    async fn native_and_issued_assets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/accounts/{ACCOUNT}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": ACCOUNT,
                "sequence": "1",
                "balances": [
                    {"balance": "9.9999000", "limit": "1000.0000000", "asset_type": "credit_alphanum4",
                     "asset_code": "USD", "asset_issuer": "GBUYUAI75XXWDZEKLY66CFYKQPET5JR4EENXZBUZ3YXZ7DS56Z4OKOFU"},
                    {"balance": "100.5000000", "asset_type": "native"}
                ]
            })))
            .mount(&server)
            .await;

        let adapter = StellarAdapter::new(
            RestClient::new(&server.uri(), Duration::from_secs(2)).unwrap(),
            vec![ACCOUNT.to_string()],
        );
        let balances = adapter.fetch_balances().await.unwrap();

        assert_eq!(balances[0].currency, "USD");
        assert_eq!(balances[1], Balance::new("XLM", 100.5, 0.0).in_account(ACCOUNT));
    }

    #[tokio::test]
    async fn unknown_account_fails_when_it_is_the_only_one() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "type": "https://stellar.org/horizon-errors/not_found", "status": 404
            })))
            .mount(&server)
            .await;

        let adapter = StellarAdapter::new(
            RestClient::new(&server.uri(), Duration::from_secs(2)).unwrap(),
            vec!["GNOPE".to_string()],
        );
        assert!(adapter.fetch_balances().await.is_err());
    }
}
