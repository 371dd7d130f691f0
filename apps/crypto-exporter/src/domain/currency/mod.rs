//! Currency Codes and Pairs
//!
//! Exchanges report the same asset under different codes (Kraken's `XBT`,
//! Poloniex's `STR`). Every code that reaches a metric label goes through
//! [`normalize`] so one asset always reports under one label.

use std::fmt;

/// Legacy or alternate asset codes and their canonical replacement.
const ALIASES: &[(&str, &str)] = &[
    ("DASH", "DSH"),
    ("XBT", "BTC"),
    ("DOGE", "XDG"),
    ("STR", "XLM"),
];

/// Map an exchange-specific currency code to its canonical label.
///
/// Unrecognized codes pass through unchanged.
#[must_use]
pub fn normalize(code: &str) -> String {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == code)
        .map_or_else(|| code.to_string(), |(_, canonical)| (*canonical).to_string())
}

// =============================================================================
// Symbol
// =============================================================================

/// A tradable pair identifier exactly as the exchange reports it.
///
/// Some exchanges list the two currency legs alongside the identifier; those
/// are kept so the pair never has to be guessed from the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    id: String,
    legs: Option<(String, String)>,
}

impl Symbol {
    /// Create a symbol without known legs.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            legs: None,
        }
    }

    /// Create a symbol whose base and quote currencies are known.
    #[must_use]
    pub fn with_legs(
        id: impl Into<String>,
        base: impl Into<String>,
        quote: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            legs: Some((base.into(), quote.into())),
        }
    }

    /// The exchange identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The raw pair, if the exchange reported both legs.
    #[must_use]
    pub fn pair(&self) -> Option<CurrencyPair> {
        self.legs
            .as_ref()
            .and_then(|(base, quote)| CurrencyPair::new(base, quote))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

// =============================================================================
// Currency Pair
// =============================================================================

/// Base and quote currency of a traded pair. Both sides are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurrencyPair {
    base: String,
    quote: String,
}

impl CurrencyPair {
    /// Build a pair, rejecting empty or whitespace-only legs.
    #[must_use]
    pub fn new(base: &str, quote: &str) -> Option<Self> {
        let base = base.trim();
        let quote = quote.trim();
        if base.is_empty() || quote.is_empty() {
            return None;
        }
        Some(Self {
            base: base.to_string(),
            quote: quote.to_string(),
        })
    }

    /// Split an identifier on `separator`.
    ///
    /// Returns `None` unless the identifier has exactly two non-empty parts.
    #[must_use]
    pub fn split(id: &str, separator: char) -> Option<Self> {
        let mut parts = id.split(separator);
        let base = parts.next()?;
        let quote = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        Self::new(base, quote)
    }

    /// Split a concatenated identifier such as `btcusd` into two legs of
    /// `width` characters each. Codes are upper-cased.
    #[must_use]
    pub fn split_fixed(id: &str, width: usize) -> Option<Self> {
        if width == 0 || id.len() != width * 2 || !id.is_ascii() {
            return None;
        }
        let (base, quote) = id.split_at(width);
        Self::new(&base.to_ascii_uppercase(), &quote.to_ascii_uppercase())
    }

    /// Base (source) currency.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Quote (target) currency.
    #[must_use]
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Apply [`normalize`] to both legs.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            base: normalize(&self.base),
            quote: normalize(&self.quote),
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("XBT", "BTC")]
    #[test_case("DASH", "DSH")]
    #[test_case("DOGE", "XDG")]
    #[test_case("STR", "XLM")]
    #[test_case("ETH", "ETH")]
    #[test_case("", ""; "empty code")]
    #[test_case("xbt", "xbt"; "aliases are case sensitive")]
    fn normalize_table(input: &str, expected: &str) {
        assert_eq!(normalize(input), expected);
    }

    proptest! {
        #[test]
        fn normalize_passes_unknown_codes_through(code in "[A-Z0-9]{1,8}") {
            prop_assume!(!ALIASES.iter().any(|(alias, _)| *alias == code));
            prop_assert_eq!(normalize(&code), code);
        }

        #[test]
        fn split_yields_two_non_empty_legs_or_nothing(id in "[A-Z-]{0,12}") {
            if let Some(pair) = CurrencyPair::split(&id, '-') {
                prop_assert!(!pair.base().is_empty());
                prop_assert!(!pair.quote().is_empty());
                prop_assert_eq!(id.split('-').count(), 2);
            }
        }
    }

    #[test]
    fn split_requires_exactly_two_components() {
        let pair = CurrencyPair::split("BTC-USD", '-').unwrap();
        assert_eq!(pair.base(), "BTC");
        assert_eq!(pair.quote(), "USD");

        assert!(CurrencyPair::split("BTCUSD", '-').is_none());
        assert!(CurrencyPair::split("BTC-USD-PERP", '-').is_none());
        assert!(CurrencyPair::split("-USD", '-').is_none());
        assert!(CurrencyPair::split("BTC-", '-').is_none());
    }

    #[test]
    fn split_fixed_width() {
        let pair = CurrencyPair::split_fixed("btcusd", 3).unwrap();
        assert_eq!(pair.base(), "BTC");
        assert_eq!(pair.quote(), "USD");

        assert!(CurrencyPair::split_fixed("btcusdt", 3).is_none());
        assert!(CurrencyPair::split_fixed("", 3).is_none());
    }

    #[test]
    fn normalized_pair_translates_both_legs() {
        let pair = CurrencyPair::new("XBT", "DOGE").unwrap().normalized();
        assert_eq!(pair.base(), "BTC");
        assert_eq!(pair.quote(), "XDG");
    }

    #[test]
    fn symbol_with_legs_exposes_pair() {
        let symbol = Symbol::with_legs("XXBTZUSD", "XBT", "USD");
        assert_eq!(symbol.id(), "XXBTZUSD");
        assert_eq!(symbol.pair().unwrap().to_string(), "XBT/USD");

        assert!(Symbol::new("XXBTZUSD").pair().is_none());
        assert!(Symbol::with_legs("odd", "", "USD").pair().is_none());
    }
}
