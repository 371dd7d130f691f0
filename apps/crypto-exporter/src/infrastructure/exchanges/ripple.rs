//! Ripple Data API v2: balances of public XRP ledger accounts.

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::{
    AdapterError, Balance, ExchangeAdapter, SymbolPolicy, TickerMode,
};
use crate::infrastructure::rest::RestClient;

use super::{Amount, merge_address_results};

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    result: String,
    message: Option<String>,
    #[serde(default)]
    balances: Vec<LedgerBalance>,
}

#[derive(Debug, Deserialize)]
struct LedgerBalance {
    currency: String,
    value: Amount,
}

/// Ripple adapter.
#[derive(Debug)]
pub struct RippleAdapter {
    client: RestClient,
    addresses: Vec<String>,
}

impl RippleAdapter {
    /// Create the adapter.
    #[must_use]
    pub const fn new(client: RestClient, addresses: Vec<String>) -> Self {
        Self { client, addresses }
    }

    async fn address_balances(&self, address: &str) -> Result<Vec<Balance>, AdapterError> {
        let path = format!("/v2/accounts/{address}/balances");
        let response: BalancesResponse = self.client.get_json(&path, &[]).await?;

        if response.result != "success" {
            return Err(AdapterError::Api {
                status: 200,
                message: format!(
                    "{}: {}",
                    response.result,
                    response.message.unwrap_or_default()
                ),
            });
        }

        response
            .balances
            .into_iter()
            .map(|b| Ok(Balance::new(b.currency, b.value.value()?, 0.0).in_account(address)))
            .collect()
    }
}

#[async_trait]
impl ExchangeAdapter for RippleAdapter {
    fn name(&self) -> &str {
        "ripple"
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
            results.push((address.clone(), self.address_balances(address).await));
        }
        merge_address_results(self.name(), results)
    }
}
