//! Domain Layer - Core exporter types and normalization rules.
//!
//! This layer contains the types that flow from exchange adapters to the
//! metric sinks. Nothing here performs I/O.

/// Currency code normalization and pair parsing.
pub mod currency;

/// Per-cycle poll results (rates, balances, failures).
pub mod poll;
