//! Poll Cycle
//!
//! One collection pass against one exchange: resolve symbols, fetch tickers,
//! fetch balances, normalize, and hand the result to a sink.
//!
//! Symbol resolution and the balance fetch run concurrently on the same task
//! (`tokio::join!` over disjoint fields), so a symbol endpoint stuck in its
//! retry loop never holds back balances. Everything else is sequential.
//!
//! No sub-step is fatal. Failed calls become [`PollFailure`] entries and the
//! cycle carries on with whatever data it has.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::retry::{RetryConfig, RetryPolicy};
use crate::application::ports::{
    AdapterError, Balance, ExchangeAdapter, MetricSink, SymbolPolicy, Ticker, TickerMode,
};
use crate::domain::currency::{CurrencyPair, Symbol, normalize};
use crate::domain::poll::{
    AccountBalance, BalanceType, Operation, PollFailure, PollResult, TickerRate,
};

/// Per-instance knobs for the poll cycle.
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Value of the `exchange` label.
    pub exchange: String,
    /// Account label for balances that carry none of their own.
    pub account_label: String,
    /// Explicit symbol list; restricts the tickers to these ids when set.
    pub symbols: Option<Vec<Symbol>>,
    /// Pause between consecutive per-symbol ticker calls.
    pub rate_limit_delay: Duration,
    /// Retry behavior for listing symbols.
    pub symbol_retry: RetryConfig,
}

impl PollSettings {
    /// Defaults for an exchange label: account label equal to the exchange,
    /// 1 s between per-symbol calls, unlimited 1 s symbol retries.
    #[must_use]
    pub fn new(exchange: impl Into<String>) -> Self {
        let exchange = exchange.into();
        Self {
            account_label: exchange.clone(),
            exchange,
            symbols: None,
            rate_limit_delay: Duration::from_secs(1),
            symbol_retry: RetryConfig::default(),
        }
    }
}

/// Where the current cycle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    /// No cycle has run yet.
    Idle,
    /// Symbols are resolved (possibly to an empty list).
    SymbolsReady,
    /// Tickers are fetched and translated.
    TickersFetched,
    /// Balances are fetched and translated.
    BalancesFetched,
    /// The result was handed to the sink.
    Emitted,
}

impl CycleStage {
    /// Name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SymbolsReady => "symbols_ready",
            Self::TickersFetched => "tickers_fetched",
            Self::BalancesFetched => "balances_fetched",
            Self::Emitted => "emitted",
        }
    }
}

/// Whether balances are polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceAccess {
    /// Balances are fetched every cycle.
    Enabled,
    /// The adapter has no credentials or addresses.
    NoCredentials,
    /// The exchange rejected the credentials; never retried.
    Disabled,
}

impl BalanceAccess {
    /// Whether balances are still being polled.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }

    /// Name used in logs and health output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::NoCredentials => "no_credentials",
            Self::Disabled => "disabled",
        }
    }
}

/// Orchestrator for one exchange instance.
///
/// Owns the cross-cycle state: the cached symbol list and the balance
/// access flag. Adapters stay stateless.
pub struct PollCycle {
    adapter: Arc<dyn ExchangeAdapter>,
    settings: PollSettings,
    symbol_cache: Option<Vec<Symbol>>,
    balance_access: BalanceAccess,
    stage: CycleStage,
}

impl PollCycle {
    /// Create a cycle for an adapter.
    #[must_use]
    pub fn new(adapter: Arc<dyn ExchangeAdapter>, settings: PollSettings) -> Self {
        let balance_access = if adapter.has_balance_access() {
            BalanceAccess::Enabled
        } else {
            BalanceAccess::NoCredentials
        };

        Self {
            adapter,
            settings,
            symbol_cache: None,
            balance_access,
            stage: CycleStage::Idle,
        }
    }

    /// Exchange label.
    #[must_use]
    pub fn exchange(&self) -> &str {
        &self.settings.exchange
    }

    /// Stage reached by the last cycle.
    #[must_use]
    pub const fn stage(&self) -> CycleStage {
        self.stage
    }

    /// Current balance polling state.
    #[must_use]
    pub const fn balance_access(&self) -> BalanceAccess {
        self.balance_access
    }

    /// Run one cycle and emit the result.
    ///
    /// Sink errors are logged; the collected result is returned either way.
    pub async fn run(&mut self, sink: &dyn MetricSink) -> PollResult {
        let result = self.collect().await;

        match sink.emit(&result).await {
            Ok(()) => {
                self.advance(CycleStage::Emitted);
            }
            Err(e) => {
                warn!(exchange = %self.settings.exchange, error = %e, "Failed to emit metrics");
            }
        }

        result
    }

    /// Run one cycle without emitting.
    pub async fn collect(&mut self) -> PollResult {
        let adapter = self.adapter.as_ref();
        let settings = &self.settings;

        let ((symbols, mut failures), (balances, balance_failures)) = tokio::join!(
            resolve_symbols(adapter, settings, &mut self.symbol_cache),
            fetch_balances(adapter, settings, &mut self.balance_access),
        );
        self.advance(CycleStage::SymbolsReady);

        let (tickers, ticker_failures) = self.fetch_tickers(&symbols).await;
        failures.extend(ticker_failures);
        let rates = self.translate_tickers(tickers, &symbols);
        self.advance(CycleStage::TickersFetched);

        failures.extend(balance_failures);
        self.advance(CycleStage::BalancesFetched);

        debug!(
            exchange = %self.settings.exchange,
            rates = rates.len(),
            balances = balances.len(),
            failures = failures.len(),
            "Cycle collected"
        );

        PollResult {
            rates,
            balances,
            failures,
        }
    }

    fn advance(&mut self, stage: CycleStage) {
        debug!(exchange = %self.settings.exchange, stage = stage.as_str(), "Cycle stage");
        self.stage = stage;
    }

    async fn fetch_tickers(&self, symbols: &[Symbol]) -> (Vec<Ticker>, Vec<PollFailure>) {
        let adapter = self.adapter.as_ref();
        let mut failures = Vec::new();

        match adapter.ticker_mode() {
            TickerMode::Unsupported => (Vec::new(), failures),
            TickerMode::Bulk => {
                let needs_symbols = matches!(
                    adapter.symbol_policy(),
                    SymbolPolicy::Cached | SymbolPolicy::RefreshEachCycle
                );
                if needs_symbols && symbols.is_empty() {
                    debug!(exchange = %self.settings.exchange, "No symbols, skipping tickers");
                    return (Vec::new(), failures);
                }

                match adapter.fetch_tickers(symbols).await {
                    Ok(tickers) => (tickers, failures),
                    Err(e) => {
                        failures.push(self.failure(Operation::FetchTickers, None, &e));
                        (Vec::new(), failures)
                    }
                }
            }
            TickerMode::PerSymbol => {
                let mut tickers = Vec::with_capacity(symbols.len());
                for (i, symbol) in symbols.iter().enumerate() {
                    if i > 0 && !self.settings.rate_limit_delay.is_zero() {
                        tokio::time::sleep(self.settings.rate_limit_delay).await;
                    }
                    match adapter.fetch_ticker(symbol).await {
                        Ok(ticker) => tickers.push(ticker),
                        Err(e) => {
                            failures.push(self.failure(
                                Operation::FetchTickers,
                                Some(symbol.id()),
                                &e,
                            ));
                        }
                    }
                }
                (tickers, failures)
            }
        }
    }

    fn translate_tickers(&self, tickers: Vec<Ticker>, known: &[Symbol]) -> Vec<TickerRate> {
        let known: HashMap<&str, CurrencyPair> = known
            .iter()
            .filter_map(|symbol| symbol.pair().map(|pair| (symbol.id(), pair)))
            .collect();
        let wanted: Option<HashSet<&str>> = self
            .settings
            .symbols
            .as_ref()
            .map(|symbols| symbols.iter().map(Symbol::id).collect());

        let mut by_pair: BTreeMap<(String, String), f64> = BTreeMap::new();
        for ticker in tickers {
            if wanted
                .as_ref()
                .is_some_and(|wanted| !wanted.contains(ticker.symbol.id()))
            {
                continue;
            }
            if !ticker.price.is_finite() || ticker.price <= 0.0 {
                debug!(symbol = %ticker.symbol, price = ticker.price, "Dropping non-positive price");
                continue;
            }

            let pair = ticker
                .symbol
                .pair()
                .or_else(|| known.get(ticker.symbol.id()).cloned())
                .or_else(|| self.adapter.split_symbol(ticker.symbol.id()));
            let Some(pair) = pair else {
                debug!(symbol = %ticker.symbol, "Dropping ticker with unknown pair");
                continue;
            };

            let pair = pair.normalized();
            by_pair.insert(
                (pair.base().to_string(), pair.quote().to_string()),
                ticker.price,
            );
        }

        by_pair
            .into_iter()
            .map(|((source_currency, target_currency), value)| TickerRate {
                source_currency,
                target_currency,
                value,
                exchange: self.settings.exchange.clone(),
            })
            .collect()
    }

    fn failure(&self, operation: Operation, symbol: Option<&str>, error: &AdapterError) -> PollFailure {
        record_failure(&self.settings.exchange, operation, symbol, error)
    }
}

fn record_failure(
    exchange: &str,
    operation: Operation,
    symbol: Option<&str>,
    error: &AdapterError,
) -> PollFailure {
    warn!(
        exchange,
        operation = operation.as_str(),
        kind = error.kind().as_str(),
        symbol,
        error = %error,
        "Exchange call failed"
    );

    PollFailure {
        operation,
        kind: error.kind(),
        symbol: symbol.map(str::to_string),
        message: error.to_string(),
    }
}

async fn resolve_symbols(
    adapter: &dyn ExchangeAdapter,
    settings: &PollSettings,
    cache: &mut Option<Vec<Symbol>>,
) -> (Vec<Symbol>, Vec<PollFailure>) {
    let policy = adapter.symbol_policy();
    let (listed, failures) = match policy {
        // Fused tickers are filtered by id after the bulk call.
        SymbolPolicy::Fused | SymbolPolicy::None => return (Vec::new(), Vec::new()),
        SymbolPolicy::Cached if cache.is_some() => {
            (cache.clone().unwrap_or_default(), Vec::new())
        }
        SymbolPolicy::Cached | SymbolPolicy::RefreshEachCycle => {
            let (listed, failures) = list_with_retry(adapter, settings).await;
            match listed {
                Some(symbols) => {
                    debug!(exchange = %settings.exchange, count = symbols.len(), "Symbols listed");
                    // An empty list is listed again next cycle.
                    if !symbols.is_empty() {
                        *cache = Some(symbols.clone());
                    }
                    (symbols, failures)
                }
                // A stale list beats no list when refreshing.
                None => (cache.clone().unwrap_or_default(), failures),
            }
        }
    };

    match &settings.symbols {
        Some(configured) => (restrict_symbols(&listed, configured), failures),
        None => (listed, failures),
    }
}

/// Keep the configured ids, taking legs from the listing where it has them.
fn restrict_symbols(listed: &[Symbol], configured: &[Symbol]) -> Vec<Symbol> {
    configured
        .iter()
        .map(|wanted| {
            listed
                .iter()
                .find(|symbol| symbol.id() == wanted.id())
                .cloned()
                .unwrap_or_else(|| wanted.clone())
        })
        .collect()
}

/// Call `list_symbols` until it succeeds or the retry policy gives up.
///
/// Only the last error is recorded as a failure, however many attempts ran.
async fn list_with_retry(
    adapter: &dyn ExchangeAdapter,
    settings: &PollSettings,
) -> (Option<Vec<Symbol>>, Vec<PollFailure>) {
    let mut policy = RetryPolicy::new(settings.symbol_retry.clone());
    let mut last_error: Option<AdapterError> = None;

    let listed = loop {
        match adapter.list_symbols().await {
            Ok(symbols) => {
                if policy.attempt_count() > 0 {
                    info!(
                        exchange = %settings.exchange,
                        attempts = policy.attempt_count() + 1,
                        "Symbol list recovered"
                    );
                }
                break Some(symbols);
            }
            Err(AdapterError::Unsupported(op)) => {
                last_error = Some(AdapterError::Unsupported(op));
                break None;
            }
            Err(e) => {
                let Some(delay) = policy.next_delay() else {
                    warn!(
                        exchange = %settings.exchange,
                        attempts = policy.attempt_count() + 1,
                        error = %e,
                        "Giving up on symbol list"
                    );
                    last_error = Some(e);
                    break None;
                };
                debug!(
                    exchange = %settings.exchange,
                    attempt = policy.attempt_count(),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Symbol list failed, retrying"
                );
                last_error = Some(e);
                tokio::time::sleep(delay).await;
            }
        }
    };

    let failures = last_error
        .map(|e| record_failure(&settings.exchange, Operation::ListSymbols, None, &e))
        .into_iter()
        .collect();

    (listed, failures)
}

async fn fetch_balances(
    adapter: &dyn ExchangeAdapter,
    settings: &PollSettings,
    access: &mut BalanceAccess,
) -> (Vec<AccountBalance>, Vec<PollFailure>) {
    if !access.is_enabled() {
        return (Vec::new(), Vec::new());
    }

    match adapter.fetch_balances().await {
        Ok(balances) => (translate_balances(balances, settings), Vec::new()),
        Err(e) => {
            if e.is_unauthorized() {
                warn!(
                    exchange = %settings.exchange,
                    "Credentials rejected, disabling balance polling"
                );
                *access = BalanceAccess::Disabled;
            }
            let failure = record_failure(&settings.exchange, Operation::FetchBalances, None, &e);
            (Vec::new(), vec![failure])
        }
    }
}

fn translate_balances(balances: Vec<Balance>, settings: &PollSettings) -> Vec<AccountBalance> {
    let mut by_key: BTreeMap<(String, String, &'static str), AccountBalance> = BTreeMap::new();

    for balance in balances {
        let code = balance.currency.trim();
        if code.is_empty() {
            continue;
        }
        let currency = normalize(code);
        let account_label = balance
            .account
            .clone()
            .unwrap_or_else(|| settings.account_label.clone());

        for (balance_type, value) in [
            (BalanceType::Free, balance.free),
            (BalanceType::Used, balance.used),
        ] {
            if !value.is_finite() || value <= 0.0 {
                continue;
            }
            by_key.insert(
                (currency.clone(), account_label.clone(), balance_type.as_str()),
                AccountBalance {
                    currency: currency.clone(),
                    account_label: account_label.clone(),
                    balance_type,
                    value,
                    exchange: settings.exchange.clone(),
                },
            );
        }
    }

    by_key.into_values().collect()
}
