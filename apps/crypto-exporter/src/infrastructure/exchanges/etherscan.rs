//! Etherscan account API: ether balances for all addresses in one call, then
//! one `tokenbalance` call per address and tracked ERC-20 token.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::application::ports::{
    AdapterError, Balance, ExchangeAdapter, SymbolPolicy, TickerMode,
};
use crate::infrastructure::config::TokenConfig;
use crate::infrastructure::rest::RestClient;

use super::parse_amount;

const WEI_PER_ETHER: f64 = 1e18;

/// Envelope of every Etherscan response. `result` is a string on errors.
#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    message: String,
    result: Value,
}

impl EtherscanResponse {
    fn into_result(self) -> Result<Value, AdapterError> {
        if self.status == "1" {
            return Ok(self.result);
        }
        let detail = self.result.as_str().unwrap_or(&self.message).to_string();
        if detail.contains("Invalid API Key") || detail.contains("Missing/Invalid API Key") {
            Err(AdapterError::Unauthorized(detail))
        } else {
            Err(AdapterError::Api {
                status: 200,
                message: format!("{}: {detail}", self.message),
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    account: String,
    balance: String,
}

/// Etherscan adapter.
#[derive(Debug)]
pub struct EtherscanAdapter {
    client: RestClient,
    api_key: String,
    addresses: Vec<String>,
    tokens: Vec<TokenConfig>,
    request_delay: Duration,
}

impl EtherscanAdapter {
    /// Create the adapter.
    #[must_use]
    pub const fn new(
        client: RestClient,
        api_key: String,
        addresses: Vec<String>,
        tokens: Vec<TokenConfig>,
        request_delay: Duration,
    ) -> Self {
        Self {
            client,
            api_key,
            addresses,
            tokens,
            request_delay,
        }
    }

    async fn call(&self, query: &[(&str, &str)]) -> Result<Value, AdapterError> {
        let mut params = vec![("module", "account"), ("tag", "latest")];
        params.extend_from_slice(query);
        params.push(("apikey", self.api_key.as_str()));

        let response: EtherscanResponse = self.client.get_json("", &params).await?;
        response.into_result()
    }

    async fn ether_balances(&self) -> Result<Vec<Balance>, AdapterError> {
        let addresses = self.addresses.join(",");
        let result = self
            .call(&[("action", "balancemulti"), ("address", addresses.as_str())])
            .await?;
        let accounts: Vec<AccountBalance> =
            serde_json::from_value(result).map_err(|e| AdapterError::Malformed(e.to_string()))?;

        accounts
            .into_iter()
            .map(|a| {
                let ether = parse_amount(&a.balance)? / WEI_PER_ETHER;
                Ok(Balance::new("ETH", ether, 0.0).in_account(a.account))
            })
            .collect()
    }

    async fn token_balance(&self, address: &str, token: &TokenConfig) -> Result<f64, AdapterError> {
        let result = self
            .call(&[
                ("action", "tokenbalance"),
                ("contractaddress", token.contract.as_str()),
                ("address", address),
            ])
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| AdapterError::Malformed(format!("unexpected result: {result}")))?;

        Ok(parse_amount(raw)? / 10f64.powf(f64::from(token.decimals)))
    }
}

#[async_trait]
impl ExchangeAdapter for EtherscanAdapter {
    fn name(&self) -> &str {
        "etherscan"
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
        let mut balances = self.ether_balances().await?;

        // Token lookups are best effort; the free API tier allows a few calls
        // per second.
        for address in &self.addresses {
            for token in &self.tokens {
                tokio::time::sleep(self.request_delay).await;
                match self.token_balance(address, token).await {
                    Ok(value) => {
                        debug!(address = %address, token = %token.short, value, "Token balance");
                        balances.push(Balance::new(&token.short, value, 0.0).in_account(address));
                    }
                    Err(e) => {
                        warn!(
                            exchange = "etherscan",
                            address = %address,
                            token = %token.short,
                            error = %e,
                            "Token balance lookup failed"
                        );
                    }
                }
            }
        }

        Ok(balances)
    }
}
