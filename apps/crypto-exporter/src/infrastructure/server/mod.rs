//! Metrics and Health HTTP Server
//!
//! Serves one HTTP-mode exporter instance.
//!
//! # Endpoints
//!
//! - `GET /metrics` - Latest exchange snapshot plus process self-metrics
//! - `GET /health` - JSON status of the instance
//! - `GET /healthz` - Liveness probe (simple OK)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::metrics::{SnapshotSink, get_metrics_handle};
use crate::infrastructure::runtime::InstanceStatus;

const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Exchange label.
    pub exchange: String,
    /// Exporter version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
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
    pub balance_polling: String,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// The last cycle completed without failures.
    Healthy,
    /// No cycle yet, or the last one had failures.
    Degraded,
    /// The last cycle failed every call and produced nothing.
    Unhealthy,
}

// =============================================================================
// Server State
// =============================================================================

/// Shared state for one instance's server.
pub struct ServerState {
    exchange: String,
    version: String,
    started_at: Instant,
    snapshot: Arc<SnapshotSink>,
    status: Arc<InstanceStatus>,
}

impl ServerState {
    /// Create server state.
    #[must_use]
    pub fn new(
        exchange: impl Into<String>,
        snapshot: Arc<SnapshotSink>,
        status: Arc<InstanceStatus>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
            snapshot,
            status,
        }
    }
}

// =============================================================================
// Server
// =============================================================================

/// HTTP server for one instance.
pub struct MetricsServer {
    port: u16,
    state: Arc<ServerState>,
    cancel: CancellationToken,
}

impl MetricsServer {
    /// Create a server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<ServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Bind the port. Binding happens at startup so that a taken port is a
    /// startup error rather than a log line.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::BindFailed` if the port cannot be bound.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(self.port, e.to_string()))?;

        Ok(BoundServer {
            listener,
            server: self,
        })
    }
}

/// A server with its port bound, ready to serve.
pub struct BoundServer {
    listener: TcpListener,
    server: MetricsServer,
}

impl BoundServer {
    /// Serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::ServerFailed` if the HTTP server fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let Self { listener, server } = self;
        let exchange = server.state.exchange.clone();

        tracing::info!(exchange = %exchange, port = server.port, "Metrics server listening");

        axum::serve(listener, router(server.state))
            .with_graceful_shutdown(server.cancel.cancelled_owned())
            .await
            .map_err(|e| ServerError::ServerFailed(e.to_string()))?;

        tracing::info!(exchange = %exchange, "Metrics server stopped");
        Ok(())
    }
}

/// Routes for one instance.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn metrics_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let mut body = state.snapshot.render();
    if let Some(handle) = get_metrics_handle() {
        body.push_str(&handle.render());
    }
    (
        StatusCode::OK,
        [("content-type", METRICS_CONTENT_TYPE)],
        body,
    )
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

fn build_health_response(state: &ServerState) -> HealthResponse {
    let status = state.status.snapshot();
    let health = determine_health_status(
        status.last_poll.is_some(),
        status.rates + status.balances,
        status.failures,
    );

    HealthResponse {
        status: health,
        exchange: state.exchange.clone(),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        last_poll: status.last_poll,
        cycles: status.cycles,
        rates: status.rates,
        balances: status.balances,
        failures: status.failures,
        balance_polling: status.balance_polling.to_string(),
    }
}

const fn determine_health_status(polled: bool, samples: usize, failures: usize) -> HealthStatus {
    match (polled, samples, failures) {
        (false, _, _) => HealthStatus::Degraded,
        (true, _, 0) => HealthStatus::Healthy,
        (true, 0, _) => HealthStatus::Unhealthy,
        (true, _, _) => HealthStatus::Degraded,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Metrics server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
