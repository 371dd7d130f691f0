//! Configuration Integration Tests
//!
//! Loads full config files and checks the instances and adapters they
//! resolve to.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;
use std::time::Duration;

use crypto_exporter::infrastructure::config::{ExportMode, LogFormat};
use crypto_exporter::infrastructure::runtime::{ExportTarget, build_instance};
use crypto_exporter::{BalanceAccess, ExchangeKind, load_config, resolve_instances};

const FULL_CONFIG: &str = r"
logging:
  level: debug
  format: json

kraken_exporter:
  interval: 30
  prom_folder: /var/lib/node_exporter
  symbols: [XXBTZUSD]

binance_exporter:
  export: http
  listen_port: 9500
  api_key: ${CRYPTO_EXPORTER_IT_BINANCE_KEY:-key}
  api_secret: ${CRYPTO_EXPORTER_IT_BINANCE_SECRET:-secret}
  account_label: trading

stellar_exporter:
  addresses:
    - GABC
    - ' '
    - GDEF

etherscan_exporter:
  api_key: ETHERSCAN
  addresses: ['0xabc']
  tokens:
    - contract: '0xdead'
      name: Tether
      short: USDT
      decimals: 6
";

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crypto_exporter.yaml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn full_config_resolves_every_section() {
    let (_dir, path) = write_config(FULL_CONFIG);
    let config = load_config(&path).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);

    let instances = resolve_instances(&config, &[]).unwrap();
    let kinds: Vec<ExchangeKind> = instances.iter().map(|i| i.kind).collect();
    assert_eq!(kinds.len(), 4);
    assert!(kinds.contains(&ExchangeKind::Kraken));
    assert!(kinds.contains(&ExchangeKind::Binance));
    assert!(kinds.contains(&ExchangeKind::Stellar));
    assert!(kinds.contains(&ExchangeKind::Etherscan));

    let kraken = instances.iter().find(|i| i.kind == ExchangeKind::Kraken).unwrap();
    assert_eq!(kraken.interval, Duration::from_secs(30));
    assert_eq!(kraken.symbols.as_deref(), Some(&["XXBTZUSD".to_string()][..]));
    assert_eq!(kraken.export, ExportMode::Text);

    let binance = instances.iter().find(|i| i.kind == ExchangeKind::Binance).unwrap();
    assert_eq!(binance.export, ExportMode::Http);
    assert_eq!(binance.listen_port, 9500);
    assert!(binance.credentials.is_some());
    assert_eq!(binance.account_label, "trading");

    let stellar = instances.iter().find(|i| i.kind == ExchangeKind::Stellar).unwrap();
    assert_eq!(stellar.addresses, vec!["GABC".to_string(), "GDEF".to_string()]);
}

#[test]
fn every_resolved_instance_builds() {
    let (_dir, path) = write_config(FULL_CONFIG);
    let config = load_config(&path).unwrap();

    for instance in resolve_instances(&config, &[]).unwrap() {
        let (exporter, target) = build_instance(&instance).unwrap();
        assert_eq!(exporter.exchange(), instance.exchange_label);

        match (instance.kind, target) {
            (ExchangeKind::Binance, ExportTarget::Http { port, .. }) => {
                assert_eq!(port, 9500);
                assert_eq!(
                    exporter.status().snapshot().balance_polling,
                    BalanceAccess::Enabled.as_str()
                );
            }
            (ExchangeKind::Kraken, ExportTarget::Textfile(file)) => {
                assert_eq!(file, PathBuf::from("/var/lib/node_exporter/kraken_exporter.prom"));
                assert_eq!(
                    exporter.status().snapshot().balance_polling,
                    BalanceAccess::NoCredentials.as_str()
                );
            }
            (ExchangeKind::Stellar | ExchangeKind::Etherscan, ExportTarget::Textfile(_)) => {
                assert_eq!(
                    exporter.status().snapshot().balance_polling,
                    BalanceAccess::Enabled.as_str()
                );
            }
            (kind, target) => panic!("unexpected target {target:?} for {kind}"),
        }
    }
}

#[test]
fn named_exchanges_run_without_sections() {
    let (_dir, path) = write_config("kraken_exporter:\n  interval: 15\n");
    let config = load_config(&path).unwrap();

    let instances =
        resolve_instances(&config, &[ExchangeKind::Bitstamp, ExchangeKind::Kraken]).unwrap();

    assert_eq!(instances.len(), 2);
    let bitstamp = instances.iter().find(|i| i.kind == ExchangeKind::Bitstamp).unwrap();
    assert_eq!(bitstamp.url, ExchangeKind::Bitstamp.default_url());
    assert_eq!(bitstamp.listen_port, ExchangeKind::Bitstamp.default_port());
    let kraken = instances.iter().find(|i| i.kind == ExchangeKind::Kraken).unwrap();
    assert_eq!(kraken.interval, Duration::from_secs(15));
}

#[test]
fn malformed_yaml_is_rejected() {
    let (_dir, path) = write_config("kraken_exporter: [unclosed\n");
    let err = load_config(&path).unwrap_err();
    assert!(!err.is_not_found());
    assert!(err.to_string().contains("parse"));
}
