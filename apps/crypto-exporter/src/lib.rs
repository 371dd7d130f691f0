#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::type_complexity,
        clippy::unreadable_literal
    )
)]

//! Crypto Exporter - Exchange Ticker and Balance Exporter
//!
//! Polls cryptocurrency exchanges and public ledgers for ticker prices and
//! account balances and republishes them as Prometheus gauges, either as a
//! node-exporter text file or on an HTTP `/metrics` endpoint.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Currency normalization and poll result types
//!   - `currency`: Code normalization, symbols, and currency pairs
//!   - `poll`: Rates, balances, and soft failures of one cycle
//!
//! - **Application**: The poll cycle and its ports
//!   - `ports`: `ExchangeAdapter` and `MetricSink`
//!   - `services`: Poll cycle orchestration and symbol-list retry policy
//!
//! - **Infrastructure**: Adapters and the process shell
//!   - `exchanges`: One REST adapter per exchange or ledger
//!   - `rest` / `signing`: Shared HTTP client and request signing
//!   - `metrics`: Prometheus rendering, sinks, and self-metrics
//!   - `config`: YAML configuration
//!   - `runtime` / `server`: Timer loop and HTTP endpoints
//!
//! # Data Flow
//!
//! ```text
//! Exchange REST API ──► Adapter ──► Poll Cycle ──► Sink ──► .prom file
//!                                  (normalize)          └─► /metrics
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core exporter types with no external dependencies.
pub mod domain;

/// Application layer - Poll cycle and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::currency::{CurrencyPair, Symbol, normalize};
pub use domain::poll::{AccountBalance, BalanceType, PollFailure, PollResult, TickerRate};

// Application
pub use application::ports::{AdapterError, ExchangeAdapter, MetricSink, SinkError};
pub use application::services::{BalanceAccess, PollCycle, PollSettings, RetryConfig, RetryPolicy};

// Infrastructure config
pub use infrastructure::config::{
    Config, ConfigError, ExchangeKind, InstanceConfig, load_config, resolve_instances,
};

// Metrics
pub use infrastructure::metrics::{SnapshotSink, TextfileSink, init_metrics, render_poll_result};
