//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the process shell around them.

/// YAML configuration, defaults, and validation.
pub mod config;

/// Exchange and ledger REST adapters.
pub mod exchanges;

/// Prometheus rendering, metric sinks, and self-metrics.
pub mod metrics;

/// Shared HTTP client and status classification.
pub mod rest;

/// Per-instance timer loop and wiring.
pub mod runtime;

/// `/metrics` and health HTTP endpoints.
pub mod server;

/// HMAC request signing and nonces.
pub mod signing;

/// Logging setup.
pub mod telemetry;
