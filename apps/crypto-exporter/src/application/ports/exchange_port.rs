//! Exchange Adapter Port (Driven Port)
//!
//! Interface every exchange binding implements. The poll cycle only talks
//! to exchanges through this trait, so adding an exchange means writing an
//! adapter, not another pipeline.

use async_trait::async_trait;

use crate::domain::currency::{CurrencyPair, Symbol};
use crate::domain::poll::FailureKind;

/// Last traded price for one symbol, as reported by the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticker {
    /// Symbol the price belongs to.
    pub symbol: Symbol,
    /// Last traded price.
    pub price: f64,
}

impl Ticker {
    /// Create a ticker.
    #[must_use]
    pub const fn new(symbol: Symbol, price: f64) -> Self {
        Self { symbol, price }
    }
}

/// Holdings of one currency, as reported by the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    /// Raw currency code.
    pub currency: String,
    /// Account the balance belongs to, when the exchange distinguishes
    /// several (wallet types, ledger addresses).
    pub account: Option<String>,
    /// Available amount.
    pub free: f64,
    /// Amount held in open orders.
    pub used: f64,
}

impl Balance {
    /// A balance in the default account.
    #[must_use]
    pub fn new(currency: impl Into<String>, free: f64, used: f64) -> Self {
        Self {
            currency: currency.into(),
            account: None,
            free,
            used,
        }
    }

    /// Attach an account label.
    #[must_use]
    pub fn in_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }
}

/// How the exchange exposes its symbol list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolPolicy {
    /// List once and keep the result for the process lifetime.
    Cached,
    /// List again at the start of every cycle.
    RefreshEachCycle,
    /// Symbols arrive with the bulk ticker call; never list separately.
    Fused,
    /// The adapter has no tickers.
    None,
}

/// How the exchange exposes prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerMode {
    /// One call returns every ticker.
    Bulk,
    /// One call per symbol.
    PerSymbol,
    /// The adapter has no tickers.
    Unsupported,
}

/// Errors from exchange calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    /// Connection error, timeout, or 5xx from the exchange.
    #[error("transient error: {0}")]
    Transient(String),

    /// The exchange rejected the call for exceeding its rate limit.
    #[error("rate limited")]
    RateLimited,

    /// The response could not be decoded or lacked an expected field.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The exchange rejected the credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other error reported by the exchange.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message or body.
        message: String,
    },

    /// The adapter does not offer this operation.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl AdapterError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Transient(_) => FailureKind::Transient,
            Self::RateLimited => FailureKind::RateLimited,
            Self::Malformed(_) => FailureKind::Malformed,
            Self::Unauthorized(_) => FailureKind::Unauthorized,
            Self::Api { .. } => FailureKind::Api,
            Self::Unsupported(_) => FailureKind::Unsupported,
        }
    }

    /// Whether the credentials were rejected.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

/// Port for one exchange's public and private REST API.
///
/// Implementations hold their own HTTP client and any per-exchange
/// configuration. They must not keep state the poll cycle depends on for
/// correctness; caching symbols and disabling balances is the cycle's job.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Exchange name used in logs.
    fn name(&self) -> &str;

    /// How symbols are obtained.
    fn symbol_policy(&self) -> SymbolPolicy;

    /// How prices are obtained.
    fn ticker_mode(&self) -> TickerMode;

    /// Whether balances can be requested (credentials or addresses present).
    fn has_balance_access(&self) -> bool;

    /// Split a symbol identifier that carries no legs.
    ///
    /// The default returns `None`, which drops the ticker.
    fn split_symbol(&self, _symbol: &str) -> Option<CurrencyPair> {
        None
    }

    /// List tradable symbols.
    async fn list_symbols(&self) -> Result<Vec<Symbol>, AdapterError> {
        Err(AdapterError::Unsupported("list_symbols"))
    }

    /// Fetch every ticker in one call.
    ///
    /// `symbols` is the resolved symbol list (empty for fused exchanges).
    async fn fetch_tickers(&self, _symbols: &[Symbol]) -> Result<Vec<Ticker>, AdapterError> {
        Err(AdapterError::Unsupported("fetch_tickers"))
    }

    /// Fetch the ticker of a single symbol.
    async fn fetch_ticker(&self, _symbol: &Symbol) -> Result<Ticker, AdapterError> {
        Err(AdapterError::Unsupported("fetch_ticker"))
    }

    /// Fetch account balances.
    async fn fetch_balances(&self) -> Result<Vec<Balance>, AdapterError> {
        Err(AdapterError::Unsupported("fetch_balances"))
    }
}
