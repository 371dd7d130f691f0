//! Rendering of a poll result in the Prometheus text format.

use metrics::{describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::domain::poll::PollResult;

/// Gauge family for ticker rates.
pub const EXCHANGE_RATE: &str = "exchange_rate";

/// Gauge family for account balances.
pub const ACCOUNT_BALANCE: &str = "account_balance";

/// Render one poll result.
///
/// A fresh recorder is built for every call, so the output holds exactly
/// the samples of `result`: nothing from earlier cycles lingers, and
/// rendering the same result twice gives the same samples.
#[must_use]
pub fn render_poll_result(result: &PollResult) -> String {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        describe_gauge!(EXCHANGE_RATE, "Current exchange rate");
        describe_gauge!(ACCOUNT_BALANCE, "Account balance");

        for rate in &result.rates {
            gauge!(
                EXCHANGE_RATE,
                "source_currency" => rate.source_currency.clone(),
                "target_currency" => rate.target_currency.clone(),
                "exchange" => rate.exchange.clone()
            )
            .set(rate.value);
        }

        for balance in &result.balances {
            gauge!(
                ACCOUNT_BALANCE,
                "source_currency" => balance.currency.clone(),
                "currency" => balance.currency.clone(),
                "account" => balance.account_label.clone(),
                "type" => balance.balance_type.as_str(),
                "exchange" => balance.exchange.clone()
            )
            .set(balance.value);
        }
    });

    handle.render()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::domain::poll::{AccountBalance, BalanceType, TickerRate};

    fn sample_result() -> PollResult {
        PollResult {
            rates: vec![
                TickerRate {
                    source_currency: "BTC".into(),
                    target_currency: "USD".into(),
                    value: 30000.5,
                    exchange: "kraken".into(),
                },
                TickerRate {
                    source_currency: "ETH".into(),
                    target_currency: "BTC".into(),
                    value: 0.0625,
                    exchange: "kraken".into(),
                },
            ],
            balances: vec![AccountBalance {
                currency: "BTC".into(),
                account_label: "main".into(),
                balance_type: BalanceType::Free,
                value: 1.25,
                exchange: "kraken".into(),
            }],
            failures: vec![],
        }
    }

    /// Sample lines, without comments, as a set.
    fn samples(rendered: &str) -> BTreeSet<String> {
        rendered
            .lines()
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(ToString::to_string)
            .collect()
    }

    fn find_sample<'a>(rendered: &'a str, family: &str, labels: &[&str]) -> Option<&'a str> {
        rendered.lines().find(|line| {
            line.starts_with(&format!("{family}{{")) && labels.iter().all(|l| line.contains(l))
        })
    }

    #[test]
    fn renders_both_families_with_labels() {
        let rendered = render_poll_result(&sample_result());

        let rate = find_sample(
            &rendered,
            EXCHANGE_RATE,
            &[
                "source_currency=\"ETH\"",
                "target_currency=\"BTC\"",
                "exchange=\"kraken\"",
            ],
        )
        .unwrap();
        assert!(rate.ends_with(" 0.0625"));

        let balance = find_sample(
            &rendered,
            ACCOUNT_BALANCE,
            &[
                "source_currency=\"BTC\"",
                "currency=\"BTC\"",
                "account=\"main\"",
                "type=\"free\"",
            ],
        )
        .unwrap();
        assert!(balance.ends_with(" 1.25"));
        assert!(rendered.contains("# TYPE exchange_rate gauge"));
    }

    #[test]
    fn emission_is_idempotent() {
        let result = sample_result();
        let first = render_poll_result(&result);
        let second = render_poll_result(&result);

        assert_eq!(samples(&first), samples(&second));
        assert_eq!(samples(&first).len(), 3);
    }

    #[test]
    fn earlier_results_do_not_linger() {
        let _ = render_poll_result(&sample_result());
        let rendered = render_poll_result(&PollResult::default());
        assert!(samples(&rendered).is_empty());
    }
}
