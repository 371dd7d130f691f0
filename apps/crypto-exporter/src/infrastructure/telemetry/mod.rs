//! Logging setup.
//!
//! The filter comes from `RUST_LOG` if set, else `LOGLEVEL`, else the
//! configured level. Output is human-readable or one JSON object per event.

use tracing_subscriber::{EnvFilter, fmt};

use crate::infrastructure::config::{LogFormat, LoggingConfig};

/// Level used when the configured directive does not parse.
const FALLBACK_LEVEL: &str = "info";

/// Pick the filter directive from the environment and the configuration.
fn filter_directive(
    rust_log: Option<String>,
    loglevel: Option<String>,
    configured: &str,
) -> String {
    rust_log
        .filter(|v| !v.trim().is_empty())
        .or_else(|| loglevel.filter(|v| !v.trim().is_empty()))
        .map_or_else(|| configured.to_string(), |v| canonical_level(&v.to_lowercase()))
}

/// Accept the `WARNING` and `CRITICAL` spellings.
fn canonical_level(level: &str) -> String {
    match level {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|e| {
        eprintln!("invalid log filter {directive:?} ({e}), using {FALLBACK_LEVEL}");
        EnvFilter::new(FALLBACK_LEVEL)
    })
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let directive = filter_directive(
        std::env::var("RUST_LOG").ok(),
        std::env::var("LOGLEVEL").ok(),
        &config.level,
    );
    let filter = build_filter(&directive);

    match config.format {
        LogFormat::Json => fmt().json().with_env_filter(filter).try_init(),
        LogFormat::Pretty => fmt().with_env_filter(filter).try_init(),
    }
}
