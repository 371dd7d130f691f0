//! Exporter Pipeline Integration Tests
//!
//! Drives configured instances against mocked exchange APIs through to the
//! text file and the HTTP endpoints.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crypto_exporter::infrastructure::config::load_config_from_string;
use crypto_exporter::infrastructure::runtime::{ExportTarget, build_instance};
use crypto_exporter::infrastructure::server::{ServerState, router};
use crypto_exporter::resolve_instances;

async fn mock_kraken() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/0/public/AssetPairs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": [],
            "result": {
                "XXBTZUSD": {"altname": "XBTUSD", "wsname": "XBT/USD"},
                "XETHZEUR": {"altname": "ETHEUR", "wsname": "ETH/EUR"}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/0/public/Ticker"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": [],
            "result": {
                "XXBTZUSD": {"c": ["30000.5", "0.01"]},
                "XETHZEUR": {"c": ["1800.25", "1.5"]}
            }
        })))
        .mount(&server)
        .await;

    server
}

#[tokio::test]
async fn text_export_writes_prom_file() {
    let server = mock_kraken().await;
    let dir = tempfile::tempdir().unwrap();

    let yaml = format!(
        "kraken_exporter:\n  url: {}\n  prom_folder: {}\n",
        server.uri(),
        dir.path().display()
    );
    let config = load_config_from_string(&yaml).unwrap();
    let instances = resolve_instances(&config, &[]).unwrap();
    let (mut instance, target) = build_instance(&instances[0]).unwrap();

    let ExportTarget::Textfile(file) = target else {
        panic!("expected text export");
    };
    assert_eq!(file, dir.path().join("kraken_exporter.prom"));

    // The symbol list is fetched once and reused by the second cycle.
    let first = instance.run_once().await;
    let second = instance.run_once().await;
    assert!(first.failures.is_empty());
    assert_eq!(second.rates.len(), 2);

    let contents = std::fs::read_to_string(&file).unwrap();
    assert!(contents.contains("# TYPE exchange_rate gauge"));
    assert!(contents.contains("source_currency=\"BTC\""));
    assert!(contents.contains("target_currency=\"USD\""));
    assert!(contents.contains("source_currency=\"ETH\""));
    assert!(contents.contains("exchange=\"kraken\""));
    assert!(!contents.contains("XBT"));
    assert!(!dir.path().join("kraken_exporter.prom.tmp").exists());
}

#[tokio::test]
async fn http_export_serves_latest_cycle() {
    let server = mock_kraken().await;

    let yaml = format!(
        "kraken_exporter:\n  url: {}\n  export: http\n  listen_port: 19400\n  exchange_label: kraken_eu\n",
        server.uri()
    );
    let config = load_config_from_string(&yaml).unwrap();
    let instances = resolve_instances(&config, &[]).unwrap();
    let (mut instance, target) = build_instance(&instances[0]).unwrap();

    let ExportTarget::Http { port, snapshot } = target else {
        panic!("expected http export");
    };
    assert_eq!(port, 19400);

    let state = Arc::new(ServerState::new(
        instance.exchange(),
        Arc::clone(&snapshot),
        instance.status(),
    ));
    instance.run_once().await;

    let response = router(Arc::clone(&state))
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.contains("exchange=\"kraken_eu\""));
    assert!(body.contains("1800.25"));

    let response = router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["exchange"], "kraken_eu");
    assert_eq!(health["cycles"], 1);
    assert_eq!(health["rates"], 2);
    assert_eq!(health["balance_polling"], "no_credentials");
}

#[tokio::test]
async fn exchange_outage_still_writes_a_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let yaml = format!(
        "kraken_exporter:\n  url: {}\n  prom_folder: {}\n  symbol_retry_delay_ms: 1\n  symbol_retry_max_attempts: 2\n",
        server.uri(),
        dir.path().display()
    );
    let config = load_config_from_string(&yaml).unwrap();
    let instances = resolve_instances(&config, &[]).unwrap();
    let (mut instance, _) = build_instance(&instances[0]).unwrap();

    let result = instance.run_once().await;

    assert!(result.rates.is_empty());
    assert!(!result.failures.is_empty());
    assert!(dir.path().join("kraken_exporter.prom").exists());
    assert_eq!(instance.status().snapshot().cycles, 1);
}

async fn run_configured(yaml: &str) -> crypto_exporter::PollResult {
    let config = load_config_from_string(yaml).unwrap();
    let instances = resolve_instances(&config, &[]).unwrap();
    let (mut instance, _) = build_instance(&instances[0]).unwrap();
    instance.run_once().await
}

#[tokio::test]
async fn binance_symbols_restrict_the_rates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/exchangeInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "symbols": [
                {"symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC", "quoteAsset": "USDT"},
                {"symbol": "ETHBTC", "status": "TRADING", "baseAsset": "ETH", "quoteAsset": "BTC"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"symbol": "BTCUSDT", "price": "30000.00000000"},
            {"symbol": "ETHBTC", "price": "0.06250000"}
        ])))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let yaml = format!(
        "binance_exporter:\n  url: {}\n  prom_folder: {}\n  symbols: [BTCUSDT]\n",
        server.uri(),
        dir.path().display()
    );
    let result = run_configured(&yaml).await;

    assert!(result.failures.is_empty());
    assert_eq!(result.rates.len(), 1);
    assert_eq!(result.rates[0].source_currency, "BTC");
    assert_eq!(result.rates[0].target_currency, "USDT");
}

#[tokio::test]
async fn hitbtc_symbols_restrict_the_rates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2/public/symbol"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "ETHBTC", "baseCurrency": "ETH", "quoteCurrency": "BTC"},
            {"id": "BTCUSD", "baseCurrency": "BTC", "quoteCurrency": "USD"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2/public/ticker"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"symbol": "ETHBTC", "last": "0.0625"},
            {"symbol": "BTCUSD", "last": "30010.5"}
        ])))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let yaml = format!(
        "hitbtc_exporter:\n  url: {}\n  prom_folder: {}\n  symbols: [ETHBTC]\n",
        server.uri(),
        dir.path().display()
    );
    let result = run_configured(&yaml).await;

    assert!(result.failures.is_empty());
    assert_eq!(result.rates.len(), 1);
    assert_eq!(result.rates[0].source_currency, "ETH");
    assert_eq!(result.rates[0].target_currency, "BTC");
}
