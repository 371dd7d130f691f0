//! Exporter Configuration Settings
//!
//! Raw YAML sections, the exchange kind table, and the resolved per-instance
//! configuration handed to constructors.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::services::{PollSettings, RetryConfig};
use crate::domain::currency::Symbol;

// =============================================================================
// Exchange Kind
// =============================================================================

/// Supported exchanges and ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExchangeKind {
    /// Kraken.
    Kraken,
    /// Bitstamp.
    Bitstamp,
    /// GDAX / Coinbase Pro.
    Gdax,
    /// Abucoins.
    Abucoins,
    /// Bitfinex.
    Bitfinex,
    /// Binance.
    Binance,
    /// Poloniex.
    Poloniex,
    /// `HitBTC`.
    Hitbtc,
    /// CEX.IO.
    Cex,
    /// Quoine / Liquid.
    Quoine,
    /// Etherscan (Ethereum ledger).
    Etherscan,
    /// Ripple data API (XRP ledger).
    Ripple,
    /// Stellar Horizon.
    Stellar,
}

impl ExchangeKind {
    /// Every supported kind.
    pub const ALL: [Self; 13] = [
        Self::Kraken,
        Self::Bitstamp,
        Self::Gdax,
        Self::Abucoins,
        Self::Bitfinex,
        Self::Binance,
        Self::Poloniex,
        Self::Hitbtc,
        Self::Cex,
        Self::Quoine,
        Self::Etherscan,
        Self::Ripple,
        Self::Stellar,
    ];

    /// Lowercase name, also the default `exchange` label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Kraken => "kraken",
            Self::Bitstamp => "bitstamp",
            Self::Gdax => "gdax",
            Self::Abucoins => "abucoins",
            Self::Bitfinex => "bitfinex",
            Self::Binance => "binance",
            Self::Poloniex => "poloniex",
            Self::Hitbtc => "hitbtc",
            Self::Cex => "cex",
            Self::Quoine => "quoine",
            Self::Etherscan => "etherscan",
            Self::Ripple => "ripple",
            Self::Stellar => "stellar",
        }
    }

    /// Parse a kind name, case-insensitively.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Parse a `<kind>_exporter` section key.
    #[must_use]
    pub fn from_section(section: &str) -> Option<Self> {
        section.strip_suffix("_exporter").and_then(Self::from_name)
    }

    /// YAML section key for this kind.
    #[must_use]
    pub fn section(&self) -> String {
        format!("{}_exporter", self.as_str())
    }

    /// Default HTTP listen port.
    #[must_use]
    pub const fn default_port(&self) -> u16 {
        match self {
            Self::Abucoins => 9299,
            Self::Bitfinex => 9300,
            Self::Gdax => 9302,
            Self::Kraken => 9303,
            Self::Poloniex => 9304,
            Self::Quoine => 9305,
            Self::Ripple => 9306,
            Self::Bitstamp => 9307,
            Self::Binance => 9308,
            Self::Stellar => 9309,
            Self::Cex => 9311,
            Self::Hitbtc => 9312,
            Self::Etherscan => 9313,
        }
    }

    /// Default API base URL.
    #[must_use]
    pub const fn default_url(&self) -> &'static str {
        match self {
            Self::Kraken => "https://api.kraken.com",
            Self::Bitstamp => "https://www.bitstamp.net/api",
            Self::Gdax => "https://api.pro.coinbase.com",
            Self::Abucoins => "https://api.abucoins.com",
            Self::Bitfinex => "https://api.bitfinex.com",
            Self::Binance => "https://api.binance.com",
            Self::Poloniex => "https://poloniex.com",
            Self::Hitbtc => "https://api.hitbtc.com",
            Self::Cex => "https://cex.io/api",
            Self::Quoine => "https://api.quoine.com",
            Self::Etherscan => "https://api.etherscan.io/api",
            Self::Ripple => "https://data.ripple.com",
            Self::Stellar => "https://horizon.stellar.org",
        }
    }

    /// Default seconds between cycles.
    #[must_use]
    pub const fn default_interval_secs(&self) -> u64 {
        match self {
            Self::Quoine | Self::Stellar => 30,
            _ => 60,
        }
    }

    /// Whether balances come from configured addresses instead of an account.
    #[must_use]
    pub const fn is_ledger(&self) -> bool {
        matches!(self, Self::Etherscan | Self::Ripple | Self::Stellar)
    }
}

impl std::fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Raw YAML Types
// =============================================================================

/// How an instance publishes its metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Write a node-exporter text file after each cycle.
    #[default]
    Text,
    /// Serve `/metrics` over HTTP.
    Http,
}

impl ExportMode {
    /// Mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Http => "http",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// An ERC-20 token tracked by the Etherscan adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Contract address.
    pub contract: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Ticker symbol used as the currency label.
    pub short: String,
    /// Decimal places of the raw integer balance.
    #[serde(default = "default_token_decimals")]
    pub decimals: u32,
}

const fn default_token_decimals() -> u32 {
    18
}

/// One `<kind>_exporter` section as written in the YAML file.
///
/// Every field is optional; [`InstanceConfig::resolve`] fills the gaps with
/// the per-kind defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Seconds between cycles.
    pub interval: Option<u64>,
    /// Text file or HTTP.
    pub export: Option<ExportMode>,
    /// Directory for text-mode output.
    pub prom_folder: Option<PathBuf>,
    /// HTTP listen port.
    pub listen_port: Option<u16>,
    /// API base URL.
    pub url: Option<String>,
    /// Request timeout in seconds.
    pub timeout: Option<u64>,
    /// API key.
    pub api_key: Option<String>,
    /// API secret.
    pub api_secret: Option<String>,
    /// API passphrase (gdax, abucoins).
    pub api_passphrase: Option<String>,
    /// Account user id (cex).
    pub uid: Option<String>,
    /// Exchange symbol ids to export; every listed market when unset.
    pub symbols: Option<Vec<String>>,
    /// Ledger addresses.
    #[serde(default)]
    pub addresses: Vec<String>,
    /// Tracked tokens (etherscan).
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    /// Pause between per-symbol ticker calls, in milliseconds.
    pub rate_limit_delay_ms: Option<u64>,
    /// Pause between symbol-list retries, in milliseconds.
    pub symbol_retry_delay_ms: Option<u64>,
    /// Symbol-list retries before giving up for the cycle (0 = unlimited).
    pub symbol_retry_max_attempts: Option<u32>,
    /// Override for the `exchange` label.
    pub exchange_label: Option<String>,
    /// Account label for balances without one of their own.
    pub account_label: Option<String>,
}

// =============================================================================
// Credentials
// =============================================================================

/// Exchange API credentials.
#[derive(Clone)]
pub struct ExchangeCredentials {
    api_key: String,
    api_secret: String,
    passphrase: Option<String>,
    uid: Option<String>,
}

impl ExchangeCredentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
            passphrase: None,
            uid: None,
        }
    }

    /// Build credentials from optional config values.
    ///
    /// Returns `None` unless both key and secret are non-empty. Interpolating
    /// an unset variable yields an empty string, which counts as absent.
    #[must_use]
    pub fn from_parts(
        api_key: Option<&str>,
        api_secret: Option<&str>,
        passphrase: Option<&str>,
        uid: Option<&str>,
    ) -> Option<Self> {
        let non_empty = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            api_key: non_empty(api_key)?,
            api_secret: non_empty(api_secret)?,
            passphrase: non_empty(passphrase),
            uid: non_empty(uid),
        })
    }

    /// Attach a passphrase.
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Attach a user id.
    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the API secret.
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    /// Get the passphrase, if any.
    #[must_use]
    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }

    /// Get the user id, if any.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }
}

impl std::fmt::Debug for ExchangeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeCredentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .field("uid", &self.uid)
            .finish()
    }
}

// =============================================================================
// Resolved Instance
// =============================================================================

/// Fully resolved configuration of one exchange instance.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// Exchange kind.
    pub kind: ExchangeKind,
    /// Time between cycle starts.
    pub interval: Duration,
    /// Text file or HTTP.
    pub export: ExportMode,
    /// Directory for text-mode output.
    pub prom_folder: PathBuf,
    /// HTTP listen port.
    pub listen_port: u16,
    /// API base URL, without trailing slash.
    pub url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// API credentials, if configured.
    pub credentials: Option<ExchangeCredentials>,
    /// Bare API key, for APIs that take a key without a secret.
    pub api_key: Option<String>,
    /// Exchange symbol ids to export; every listed market when unset.
    pub symbols: Option<Vec<String>>,
    /// Ledger addresses.
    pub addresses: Vec<String>,
    /// Tracked tokens.
    pub tokens: Vec<TokenConfig>,
    /// Pause between per-symbol ticker calls.
    pub rate_limit_delay: Duration,
    /// Symbol-list retry behavior.
    pub symbol_retry: RetryConfig,
    /// `exchange` label value.
    pub exchange_label: String,
    /// Fallback account label.
    pub account_label: String,
}

impl InstanceConfig {
    /// Defaults for a kind with no config section.
    #[must_use]
    pub fn defaults(kind: ExchangeKind) -> Self {
        Self::resolve(kind, &ExporterConfig::default())
    }

    /// Merge a raw section over the per-kind defaults.
    #[must_use]
    pub fn resolve(kind: ExchangeKind, raw: &ExporterConfig) -> Self {
        let exchange_label = raw
            .exchange_label
            .clone()
            .filter(|label| !label.trim().is_empty())
            .unwrap_or_else(|| kind.as_str().to_string());
        let account_label = raw
            .account_label
            .clone()
            .filter(|label| !label.trim().is_empty())
            .unwrap_or_else(|| exchange_label.clone());

        let url = raw
            .url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| kind.default_url().to_string());

        Self {
            kind,
            interval: Duration::from_secs(raw.interval.unwrap_or_else(|| kind.default_interval_secs())),
            export: raw.export.unwrap_or_default(),
            prom_folder: raw
                .prom_folder
                .clone()
                .unwrap_or_else(|| PathBuf::from("/var/lib/node_exporter")),
            listen_port: raw.listen_port.unwrap_or_else(|| kind.default_port()),
            url: url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(raw.timeout.unwrap_or(5)),
            credentials: ExchangeCredentials::from_parts(
                raw.api_key.as_deref(),
                raw.api_secret.as_deref(),
                raw.api_passphrase.as_deref(),
                raw.uid.as_deref(),
            ),
            api_key: raw
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            symbols: raw.symbols.clone().filter(|symbols| !symbols.is_empty()),
            addresses: raw
                .addresses
                .iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            tokens: raw.tokens.clone(),
            rate_limit_delay: Duration::from_millis(raw.rate_limit_delay_ms.unwrap_or(1000)),
            symbol_retry: RetryConfig::fixed(
                Duration::from_millis(raw.symbol_retry_delay_ms.unwrap_or(1000)),
                raw.symbol_retry_max_attempts.unwrap_or(0),
            ),
            exchange_label,
            account_label,
        }
    }

    /// Instance name used in file names and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Text-mode output path: `{prom_folder}/{instance}_exporter.prom`.
    #[must_use]
    pub fn textfile_path(&self) -> PathBuf {
        self.prom_folder.join(format!("{}_exporter.prom", self.name()))
    }

    /// Settings for the poll cycle.
    #[must_use]
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            exchange: self.exchange_label.clone(),
            account_label: self.account_label.clone(),
            symbols: self
                .symbols
                .as_ref()
                .map(|ids| ids.iter().map(Symbol::new).collect()),
            rate_limit_delay: self.rate_limit_delay,
            symbol_retry: self.symbol_retry.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_are_distinct() {
        let mut ports: Vec<u16> = ExchangeKind::ALL.iter().map(ExchangeKind::default_port).collect();
        ports.sort_unstable();
        ports.dedup();
        assert_eq!(ports.len(), ExchangeKind::ALL.len());
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in ExchangeKind::ALL {
            assert_eq!(ExchangeKind::from_name(kind.as_str()), Some(kind));
            assert_eq!(ExchangeKind::from_section(&kind.section()), Some(kind));
        }
        assert_eq!(ExchangeKind::from_name("KRAKEN"), Some(ExchangeKind::Kraken));
        assert_eq!(ExchangeKind::from_section("kraken"), None);
        assert_eq!(ExchangeKind::from_name("mtgox"), None);
    }

    #[test]
    fn defaults_match_kind() {
        let config = InstanceConfig::defaults(ExchangeKind::Stellar);
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.listen_port, 9309);
        assert_eq!(config.export, ExportMode::Text);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.exchange_label, "stellar");
        assert_eq!(config.account_label, "stellar");
        assert_eq!(config.symbol_retry, RetryConfig::default());
        assert!(config.credentials.is_none());
        assert_eq!(
            config.textfile_path(),
            PathBuf::from("/var/lib/node_exporter/stellar_exporter.prom")
        );
    }

    #[test]
    fn empty_credentials_are_absent() {
        assert!(ExchangeCredentials::from_parts(Some(""), Some("secret"), None, None).is_none());
        assert!(ExchangeCredentials::from_parts(Some("key"), None, None, None).is_none());

        let creds = ExchangeCredentials::from_parts(Some("key"), Some("secret"), Some(""), Some("up1"))
            .unwrap();
        assert_eq!(creds.api_key(), "key");
        assert_eq!(creds.passphrase(), None);
        assert_eq!(creds.uid(), Some("up1"));
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = ExchangeCredentials::new("my-key".into(), "my-secret".into())
            .with_passphrase("my-pass");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("my-key"));
        assert!(!debug.contains("my-secret"));
        assert!(!debug.contains("my-pass"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn labels_fall_back_to_exchange() {
        let raw = ExporterConfig {
            exchange_label: Some("kraken-eu".into()),
            url: Some("https://example.test/".into()),
            ..ExporterConfig::default()
        };
        let config = InstanceConfig::resolve(ExchangeKind::Kraken, &raw);
        assert_eq!(config.exchange_label, "kraken-eu");
        assert_eq!(config.account_label, "kraken-eu");
        assert_eq!(config.url, "https://example.test");
    }

    #[test]
    fn poll_settings_carry_symbols() {
        let raw = ExporterConfig {
            symbols: Some(vec!["btcusd".into()]),
            rate_limit_delay_ms: Some(250),
            account_label: Some("main".into()),
            ..ExporterConfig::default()
        };
        let settings = InstanceConfig::resolve(ExchangeKind::Bitstamp, &raw).poll_settings();
        assert_eq!(settings.exchange, "bitstamp");
        assert_eq!(settings.account_label, "main");
        assert_eq!(settings.rate_limit_delay, Duration::from_millis(250));
        assert_eq!(settings.symbols, Some(vec![Symbol::new("btcusd")]));
    }
}
