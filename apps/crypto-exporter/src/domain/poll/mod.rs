//! Poll Results
//!
//! The flat, normalized output of one collection pass. A [`PollResult`] is
//! built by the poll cycle, handed to a metric sink, and then dropped.

use serde::Serialize;

/// Last traded price for one pair on one exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerRate {
    /// Normalized base currency.
    pub source_currency: String,
    /// Normalized quote currency.
    pub target_currency: String,
    /// Last traded price.
    pub value: f64,
    /// Exchange label.
    pub exchange: String,
}

/// Whether a held amount is available or reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceType {
    /// Available for trading or withdrawal.
    Free,
    /// Reserved in open orders.
    Used,
}

impl BalanceType {
    /// Label value used in metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Used => "used",
        }
    }
}

/// A strictly-positive balance of one currency in one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountBalance {
    /// Normalized currency.
    pub currency: String,
    /// Account label (wallet type, address, or configured label).
    pub account_label: String,
    /// Free or used.
    pub balance_type: BalanceType,
    /// Amount held, always greater than zero.
    pub value: f64,
    /// Exchange label.
    pub exchange: String,
}

/// The exporter operation during which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Listing tradable symbols.
    ListSymbols,
    /// Fetching tickers (bulk or per symbol).
    FetchTickers,
    /// Fetching account balances.
    FetchBalances,
}

impl Operation {
    /// Label value used in logs and self-metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListSymbols => "list_symbols",
            Self::FetchTickers => "fetch_tickers",
            Self::FetchBalances => "fetch_balances",
        }
    }
}

/// Classification of a failed exchange call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection error, timeout, or 5xx.
    Transient,
    /// The exchange rejected the request for exceeding its rate limit.
    RateLimited,
    /// The response could not be decoded or lacked expected fields.
    Malformed,
    /// The credentials were rejected.
    Unauthorized,
    /// Any other error status from the exchange.
    Api,
    /// The adapter does not offer the operation.
    Unsupported,
}

impl FailureKind {
    /// Label value used in logs and self-metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::RateLimited => "rate_limited",
            Self::Malformed => "malformed",
            Self::Unauthorized => "unauthorized",
            Self::Api => "api",
            Self::Unsupported => "unsupported",
        }
    }
}

/// A soft failure recorded during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollFailure {
    /// Operation that failed.
    pub operation: Operation,
    /// Failure classification.
    pub kind: FailureKind,
    /// Symbol involved, for per-symbol ticker calls.
    pub symbol: Option<String>,
    /// Error text.
    pub message: String,
}

/// Everything one poll cycle collected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollResult {
    /// Ticker rates.
    pub rates: Vec<TickerRate>,
    /// Strictly-positive balances.
    pub balances: Vec<AccountBalance>,
    /// Soft failures; never fatal to the cycle.
    pub failures: Vec<PollFailure>,
}

impl PollResult {
    /// Whether the cycle produced no samples at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty() && self.balances.is_empty()
    }
}
