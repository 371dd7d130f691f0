//! Prometheus Metrics Module
//!
//! Two kinds of metrics live here:
//!
//! - **Exchange gauges** (`exchange_rate`, `account_balance`): rendered from
//!   one [`PollResult`](crate::domain::poll::PollResult) at a time through a
//!   private recorder, so each rendering holds exactly one cycle's samples.
//!   See [`render_poll_result`] and the sinks.
//! - **Self-metrics** (`crypto_exporter_*`): process-wide counters and
//!   histograms recorded into the global recorder installed by
//!   [`init_metrics`].
//!
//! # Integration
//!
//! In HTTP mode both are served together at `/metrics`.

mod exposition;
mod sink;

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub use exposition::{ACCOUNT_BALANCE, EXCHANGE_RATE, render_poll_result};
pub use sink::{SnapshotSink, TextfileSink};

use crate::application::services::BalanceAccess;
use crate::domain::poll::PollResult;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the global Prometheus recorder for self-metrics.
///
/// Idempotent. Returns `None` if another recorder was installed first.
pub fn init_metrics() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                register_metrics();
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install Prometheus recorder");
                None
            }
        })
        .clone()
}

/// The global handle, if [`init_metrics`] succeeded.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned().flatten()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "crypto_exporter_poll_cycles_total",
        "Total poll cycles completed"
    );
    describe_counter!(
        "crypto_exporter_poll_failures_total",
        "Total failed exchange calls by operation and kind"
    );
    describe_histogram!(
        "crypto_exporter_poll_duration_seconds",
        "Time to collect one poll cycle"
    );
    describe_gauge!(
        "crypto_exporter_balance_polling",
        "Whether balances are being polled (1) or not (0)"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a finished cycle: count, duration, and every soft failure.
pub fn record_poll_cycle(exchange: &str, duration: Duration, result: &PollResult) {
    counter!(
        "crypto_exporter_poll_cycles_total",
        "exchange" => exchange.to_string()
    )
    .increment(1);

    histogram!(
        "crypto_exporter_poll_duration_seconds",
        "exchange" => exchange.to_string()
    )
    .record(duration.as_secs_f64());

    for failure in &result.failures {
        counter!(
            "crypto_exporter_poll_failures_total",
            "exchange" => exchange.to_string(),
            "operation" => failure.operation.as_str(),
            "kind" => failure.kind.as_str()
        )
        .increment(1);
    }
}

/// Update the balance polling gauge.
pub fn set_balance_polling(exchange: &str, access: BalanceAccess) {
    gauge!(
        "crypto_exporter_balance_polling",
        "exchange" => exchange.to_string()
    )
    .set(if access.is_enabled() { 1.0 } else { 0.0 });
}

// =============================================================================
// Tests
// =============================================================================
