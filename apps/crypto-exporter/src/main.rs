//! Crypto Exporter Binary
//!
//! Starts one exporter instance per configured exchange.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin crypto-exporter -- --config crypto_exporter.yaml
//! cargo run --bin crypto-exporter -- --once kraken bitstamp
//! ```
//!
//! # Environment Variables
//!
//! - `CRYPTO_EXPORTER_CONFIG`: Config file path (default: /etc/crypto_exporter/crypto_exporter.yaml)
//! - `RUST_LOG`: Log filter (overrides the config level)
//! - `LOGLEVEL`: Log level, used when `RUST_LOG` is unset
//! - Anything referenced as `${VAR}` in the config file

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use crypto_exporter::infrastructure::config::{DEFAULT_CONFIG_PATH, InstanceConfig};
use crypto_exporter::infrastructure::runtime::{ExportTarget, ExporterInstance, build_instance};
use crypto_exporter::infrastructure::server::{MetricsServer, ServerState};
use crypto_exporter::infrastructure::telemetry;
use crypto_exporter::{Config, ExchangeKind, init_metrics, load_config, resolve_instances};
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Prometheus exporter for exchange tickers and balances.
#[derive(Parser, Debug)]
#[command(name = "crypto-exporter")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "CRYPTO_EXPORTER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run a single cycle per instance and exit
    #[arg(long)]
    once: bool,

    /// Only run these exchanges (default: every configured section)
    #[arg(value_parser = parse_exchange)]
    exchanges: Vec<ExchangeKind>,
}

fn parse_exchange(name: &str) -> Result<ExchangeKind, String> {
    ExchangeKind::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = ExchangeKind::ALL.iter().map(ExchangeKind::as_str).collect();
        format!("unknown exchange '{name}' (expected one of: {})", known.join(", "))
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    load_dotenv();

    let config = load_or_default(&cli)?;

    telemetry::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Crypto Exporter");

    let _metrics_handle = init_metrics();

    let instances = resolve_instances(&config, &cli.exchanges)?;
    if instances.is_empty() {
        anyhow::bail!(
            "no exporters configured in {} and none named on the command line",
            cli.config.display()
        );
    }
    log_config(&instances);

    let shutdown_token = CancellationToken::new();
    let mut built = Vec::with_capacity(instances.len());

    for config in &instances {
        let (instance, target) = build_instance(config)
            .with_context(|| format!("failed to set up {} exporter", config.name()))?;

        if let (ExportTarget::Http { port, snapshot }, false) = (&target, cli.once) {
            let state = Arc::new(ServerState::new(
                instance.exchange(),
                Arc::clone(snapshot),
                instance.status(),
            ));
            let server = MetricsServer::new(*port, state, shutdown_token.clone())
                .bind()
                .await?;
            tokio::spawn(async move {
                if let Err(e) = server.serve().await {
                    tracing::error!(error = %e, "Metrics server error");
                }
            });
        }

        built.push(instance);
    }

    if cli.once {
        run_once(built).await;
        return Ok(());
    }

    let mut tasks = JoinSet::new();
    for instance in built {
        tasks.spawn(instance.run(shutdown_token.clone()));
    }

    tracing::info!(instances = tasks.len(), "Crypto exporter ready");

    await_shutdown(shutdown_token).await;

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Exporter task failed");
            }
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!("Shutdown timeout reached, aborting remaining exporters");
        tasks.abort_all();
    }

    tracing::info!("Crypto exporter stopped");
    Ok(())
}

/// Run one cycle on every instance concurrently.
async fn run_once(instances: Vec<ExporterInstance>) {
    let mut tasks = JoinSet::new();
    for mut instance in instances {
        tasks.spawn(async move { instance.run_once().await });
    }

    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => failures += result.failures.len(),
            Err(e) => tracing::error!(error = %e, "Exporter task failed"),
        }
    }

    tracing::info!(failures, "Single run complete");
}

/// Load the config file. A missing file is fine when exchanges are named on
/// the command line; they run on defaults.
fn load_or_default(cli: &Cli) -> anyhow::Result<Config> {
    match load_config(&cli.config) {
        Ok(config) => Ok(config),
        Err(e) if e.is_not_found() && !cli.exchanges.is_empty() => {
            eprintln!(
                "config file {} not found, using defaults",
                cli.config.display()
            );
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the resolved instances.
fn log_config(instances: &[InstanceConfig]) {
    for instance in instances {
        tracing::info!(
            exchange = instance.name(),
            interval_secs = instance.interval.as_secs(),
            export = ?instance.export,
            listen_port = instance.listen_port,
            credentials = instance.credentials.is_some(),
            symbols = instance.symbols.as_ref().map_or(0, Vec::len),
            addresses = instance.addresses.len(),
            "Exporter configured"
        );
        tracing::debug!(
            exchange = instance.name(),
            url = %instance.url,
            timeout_ms = instance.timeout.as_millis() as u64,
            prom_file = %instance.textfile_path().display(),
            "Exporter endpoints"
        );
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
