//! Exporter Runtime
//!
//! Wires one [`InstanceConfig`] into a running exporter: adapter, poll
//! cycle, sink, and the timer loop that drives them. Each instance runs on
//! its own task and shares nothing mutable with the others.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::ports::MetricSink;
use crate::application::services::{BalanceAccess, PollCycle};
use crate::domain::poll::PollResult;
use crate::infrastructure::config::{ExportMode, InstanceConfig};
use crate::infrastructure::exchanges::{BuildError, build_adapter};
use crate::infrastructure::metrics::{
    SnapshotSink, TextfileSink, record_poll_cycle, set_balance_polling,
};

// =============================================================================
// Instance Status
// =============================================================================

/// What the last cycle of an instance produced, for `/health` and logs.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// When the last cycle finished.
    pub last_poll: Option<DateTime<Utc>>,
    /// Cycles completed since start.
    pub cycles: u64,
    /// Rates in the last cycle.
    pub rates: usize,
    /// Balance samples in the last cycle.
    pub balances: usize,
    /// Soft failures in the last cycle.
    pub failures: usize,
    /// Balance polling state.
    pub balance_polling: &'static str,
}

/// Shared, lock-protected status of one instance.
#[derive(Debug)]
pub struct InstanceStatus {
    inner: RwLock<StatusSnapshot>,
}

impl InstanceStatus {
    /// Status before the first cycle.
    #[must_use]
    pub fn new(balance_access: BalanceAccess) -> Self {
        Self {
            inner: RwLock::new(StatusSnapshot {
                last_poll: None,
                cycles: 0,
                rates: 0,
                balances: 0,
                failures: 0,
                balance_polling: balance_access.as_str(),
            }),
        }
    }

    /// Copy of the current status.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().clone()
    }

    fn record(&self, result: &PollResult, balance_access: BalanceAccess) {
        let mut status = self.inner.write();
        status.last_poll = Some(Utc::now());
        status.cycles += 1;
        status.rates = result.rates.len();
        status.balances = result.balances.len();
        status.failures = result.failures.len();
        status.balance_polling = balance_access.as_str();
    }
}

// =============================================================================
// Exporter Instance
// =============================================================================

/// Timer loop around one poll cycle and its sink.
pub struct ExporterInstance {
    cycle: PollCycle,
    sink: Arc<dyn MetricSink>,
    interval: Duration,
    status: Arc<InstanceStatus>,
}

impl ExporterInstance {
    /// Create an instance.
    #[must_use]
    pub fn new(cycle: PollCycle, sink: Arc<dyn MetricSink>, interval: Duration) -> Self {
        let status = Arc::new(InstanceStatus::new(cycle.balance_access()));
        Self {
            cycle,
            sink,
            interval,
            status,
        }
    }

    /// Exchange label.
    #[must_use]
    pub fn exchange(&self) -> &str {
        self.cycle.exchange()
    }

    /// Shared status handle.
    #[must_use]
    pub fn status(&self) -> Arc<InstanceStatus> {
        Arc::clone(&self.status)
    }

    /// Run and emit a single cycle.
    pub async fn run_once(&mut self) -> PollResult {
        let started = Instant::now();
        let result = self.cycle.run(self.sink.as_ref()).await;
        let elapsed = started.elapsed();

        let exchange = self.cycle.exchange();
        let balance_access = self.cycle.balance_access();
        record_poll_cycle(exchange, elapsed, &result);
        set_balance_polling(exchange, balance_access);
        self.status.record(&result, balance_access);

        info!(
            exchange,
            rates = result.rates.len(),
            balances = result.balances.len(),
            failures = result.failures.len(),
            balance_polling = balance_access.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Poll cycle complete"
        );

        result
    }

    /// Run a cycle every `interval` until cancelled.
    ///
    /// The first cycle starts immediately. A cycle that overruns the
    /// interval delays the next one instead of bunching up. Cancellation
    /// abandons an in-flight cycle.
    pub async fn run(mut self, cancel: CancellationToken) {
        let exchange = self.exchange().to_string();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            exchange = %exchange,
            interval_secs = self.interval.as_secs(),
            "Exporter started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    warn!(exchange = %exchange, "Shutdown during poll cycle, abandoning it");
                    break;
                }
                _ = self.run_once() => {}
            }
        }

        info!(exchange = %exchange, "Exporter stopped");
    }
}

// =============================================================================
// Wiring
// =============================================================================

/// Where an instance publishes its metrics.
#[derive(Debug, Clone)]
pub enum ExportTarget {
    /// Node-exporter text file.
    Textfile(PathBuf),
    /// Snapshot served over HTTP on a port.
    Http {
        /// Listen port.
        port: u16,
        /// Snapshot the server reads.
        snapshot: Arc<SnapshotSink>,
    },
}

/// Build the adapter, cycle, and sink for one configured instance.
///
/// # Errors
///
/// Returns `BuildError` if the adapter cannot be created.
pub fn build_instance(
    config: &InstanceConfig,
) -> Result<(ExporterInstance, ExportTarget), BuildError> {
    let adapter = build_adapter(config)?;
    let cycle = PollCycle::new(adapter, config.poll_settings());

    let (sink, target): (Arc<dyn MetricSink>, ExportTarget) = match config.export {
        ExportMode::Text => {
            let path = config.textfile_path();
            (
                Arc::new(TextfileSink::new(path.clone())) as Arc<dyn MetricSink>,
                ExportTarget::Textfile(path),
            )
        }
        ExportMode::Http => {
            let snapshot = Arc::new(SnapshotSink::new());
            (
                Arc::clone(&snapshot) as Arc<dyn MetricSink>,
                ExportTarget::Http {
                    port: config.listen_port,
                    snapshot,
                },
            )
        }
    };

    Ok((ExporterInstance::new(cycle, sink, config.interval), target))
}
