//! Exchange Adapters
//!
//! One [`ExchangeAdapter`] binding per supported exchange or ledger. Each
//! adapter owns a [`RestClient`] and, for private endpoints, a
//! [`RequestSigner`](crate::infrastructure::signing::RequestSigner). Response
//! shapes are private serde types inside each adapter.

mod binance;
mod bitfinex;
mod bitstamp;
mod cex;
mod coinbase;
mod etherscan;
mod hitbtc;
mod kraken;
mod poloniex;
mod quoine;
mod ripple;
mod stellar;

use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

pub use binance::BinanceAdapter;
pub use bitfinex::BitfinexAdapter;
pub use bitstamp::BitstampAdapter;
pub use cex::CexAdapter;
pub use coinbase::{CoinbaseAdapter, CoinbaseFlavor};
pub use etherscan::EtherscanAdapter;
pub use hitbtc::HitbtcAdapter;
pub use kraken::KrakenAdapter;
pub use poloniex::PoloniexAdapter;
pub use quoine::QuoineAdapter;
pub use ripple::RippleAdapter;
pub use stellar::StellarAdapter;

use crate::application::ports::{AdapterError, ExchangeAdapter};
use crate::infrastructure::config::{ExchangeKind, InstanceConfig};
use crate::infrastructure::rest::RestClient;
use crate::infrastructure::signing::SigningError;

/// Errors building an adapter at startup.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The HTTP client could not be created.
    #[error("failed to create HTTP client: {0}")]
    Client(#[from] AdapterError),

    /// The API secret is not valid for the exchange's signing scheme.
    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Build the adapter for an instance.
///
/// # Errors
///
/// Returns `BuildError` if the HTTP client cannot be created or the API
/// secret cannot be decoded.
pub fn build_adapter(config: &InstanceConfig) -> Result<Arc<dyn ExchangeAdapter>, BuildError> {
    let client = RestClient::new(&config.url, config.timeout)?;
    let credentials = config.credentials.as_ref();

    let adapter: Arc<dyn ExchangeAdapter> = match config.kind {
        ExchangeKind::Kraken => Arc::new(KrakenAdapter::new(client)),
        ExchangeKind::Bitstamp => Arc::new(BitstampAdapter::new(client)),
        ExchangeKind::Gdax => Arc::new(CoinbaseAdapter::new(
            CoinbaseFlavor::Gdax,
            client,
            credentials,
        )?),
        ExchangeKind::Abucoins => Arc::new(CoinbaseAdapter::new(
            CoinbaseFlavor::Abucoins,
            client,
            credentials,
        )?),
        ExchangeKind::Bitfinex => Arc::new(BitfinexAdapter::new(client, credentials)?),
        ExchangeKind::Binance => Arc::new(BinanceAdapter::new(client, credentials)?),
        ExchangeKind::Poloniex => Arc::new(PoloniexAdapter::new(client, credentials)?),
        ExchangeKind::Hitbtc => Arc::new(HitbtcAdapter::new(client, credentials)),
        ExchangeKind::Cex => {
            if credentials.is_some_and(|c| c.uid().is_none()) {
                warn!(exchange = "cex", "cex credentials need a uid, balances disabled");
            }
            Arc::new(CexAdapter::new(client, credentials)?)
        }
        ExchangeKind::Quoine => Arc::new(QuoineAdapter::new(client, credentials)),
        ExchangeKind::Etherscan => Arc::new(EtherscanAdapter::new(
            client,
            config.api_key.clone().unwrap_or_default(),
            config.addresses.clone(),
            config.tokens.clone(),
            config.rate_limit_delay,
        )),
        ExchangeKind::Ripple => Arc::new(RippleAdapter::new(client, config.addresses.clone())),
        ExchangeKind::Stellar => Arc::new(StellarAdapter::new(client, config.addresses.clone())),
    };

    Ok(adapter)
}

// =============================================================================
// Shared Response Helpers
// =============================================================================

/// A numeric field that exchanges send either as a JSON number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Amount {
    Number(f64),
    Text(String),
}

impl Amount {
    /// Numeric value, or `Malformed` when the text is not a number.
    pub(crate) fn value(&self) -> Result<f64, AdapterError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => parse_amount(s),
        }
    }
}

/// Numeric value of an optional amount; absent counts as zero.
pub(crate) fn amount_or_zero(amount: Option<&Amount>) -> Result<f64, AdapterError> {
    amount.map_or(Ok(0.0), Amount::value)
}

/// Parse a decimal string.
pub(crate) fn parse_amount(value: &str) -> Result<f64, AdapterError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| AdapterError::Malformed(format!("not a number: {value:?}")))
}

/// Unix time in whole seconds.
pub(crate) fn unix_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Combine per-address results: succeed if any address succeeded.
pub(crate) fn merge_address_results<T>(
    exchange: &str,
    results: Vec<(String, Result<Vec<T>, AdapterError>)>,
) -> Result<Vec<T>, AdapterError> {
    let mut merged = Vec::new();
    let mut last_error = None;
    let mut any_ok = false;

    for (address, result) in results {
        match result {
            Ok(items) => {
                any_ok = true;
                merged.extend(items);
            }
            Err(e) => {
                warn!(exchange, address = %address, error = %e, "Address lookup failed");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if !any_ok => Err(e),
        _ => Ok(merged),
    }
}
