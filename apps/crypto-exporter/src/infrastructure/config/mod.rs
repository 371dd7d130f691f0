//! Configuration Module
//!
//! YAML loading with environment variable interpolation, per-kind defaults,
//! and validation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crypto_exporter::infrastructure::config::{load_config, resolve_instances};
//!
//! let config = load_config(Path::new("/etc/crypto_exporter/crypto_exporter.yaml"))?;
//! let instances = resolve_instances(&config, &[])?;
//! ```

mod settings;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use settings::{
    ExchangeCredentials, ExchangeKind, ExportMode, ExporterConfig, InstanceConfig, LogFormat,
    LoggingConfig, TokenConfig,
};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/crypto_exporter/crypto_exporter.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Whether the file simply does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ReadError { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// `<kind>_exporter` sections, keyed by section name.
    #[serde(flatten)]
    pub exporters: BTreeMap<String, ExporterConfig>,
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    if interpolated.trim().is_empty() {
        return Ok(Config::default());
    }

    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Resolve the instances to run.
///
/// With an empty `only`, every configured section runs. Otherwise only the
/// named kinds run, using per-kind defaults where the file has no section.
///
/// # Errors
///
/// Returns a `ConfigError` if a resolved instance fails validation.
pub fn resolve_instances(
    config: &Config,
    only: &[ExchangeKind],
) -> Result<Vec<InstanceConfig>, ConfigError> {
    let sections = parse_sections(config)?;

    let instances: Vec<InstanceConfig> = if only.is_empty() {
        sections
            .iter()
            .map(|(kind, raw)| InstanceConfig::resolve(*kind, raw))
            .collect()
    } else {
        let mut kinds = only.to_vec();
        kinds.sort_unstable();
        kinds.dedup();
        kinds
            .into_iter()
            .map(|kind| {
                sections
                    .get(&kind)
                    .map_or_else(|| InstanceConfig::defaults(kind), |raw| InstanceConfig::resolve(kind, raw))
            })
            .collect()
    };

    validate_instances(&instances)?;
    Ok(instances)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match cap.get(1).map(|m| std::env::var(m.as_str())) {
            Some(Ok(v)) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

fn parse_sections(config: &Config) -> Result<BTreeMap<ExchangeKind, &ExporterConfig>, ConfigError> {
    config
        .exporters
        .iter()
        .map(|(section, raw)| {
            ExchangeKind::from_section(section)
                .map(|kind| (kind, raw))
                .ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "unknown section '{section}' (expected <exchange>_exporter)"
                    ))
                })
        })
        .collect()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    resolve_instances(config, &[]).map(|_| ())
}

fn validate_instances(instances: &[InstanceConfig]) -> Result<(), ConfigError> {
    let mut http_ports: HashMap<u16, ExchangeKind> = HashMap::new();

    for instance in instances {
        let name = instance.name();

        if instance.interval.is_zero() {
            return Err(ConfigError::ValidationError(format!(
                "{name}: interval must be positive"
            )));
        }

        if instance.timeout.is_zero() {
            return Err(ConfigError::ValidationError(format!(
                "{name}: timeout must be positive"
            )));
        }

        if instance.export == ExportMode::Http {
            if instance.listen_port == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name}: http export requires a listen_port"
                )));
            }
            if let Some(other) = http_ports.insert(instance.listen_port, instance.kind) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} and {other} must not share listen_port {}",
                    instance.listen_port
                )));
            }
        }

        if instance.kind == ExchangeKind::Etherscan && instance.api_key.is_none() {
            return Err(ConfigError::ValidationError(format!(
                "{name}: api_key is required"
            )));
        }

        if instance.kind.is_ledger() && instance.addresses.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{name}: at least one address is required"
            )));
        }
    }

    Ok(())
}
