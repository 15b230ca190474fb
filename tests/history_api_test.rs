//! Tests for the rate-history HTTP client against a mock API

use drift_rates::rates::{HistorySource, RateHistoryClient, RatesConfig};
use drift_rates::RateKind;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> RatesConfig {
    RatesConfig {
        api_base_url: server.uri(),
        retry_attempts: 1,
        rate_limit_requests_per_second: 100,
        ..Default::default()
    }
}

fn rates_body(count: i64, rate: f64) -> serde_json::Value {
    let rates: Vec<_> = (0..count)
        .map(|i| json!([1_700_000_000 + i * 86_400, rate.to_string()]))
        .collect();
    json!({ "rates": rates })
}

#[tokio::test]
async fn test_fetch_history_keeps_most_recent_days() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats/SOL/rateHistory/deposit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rates_body(40, 0.03)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stats/SOL/rateHistory/borrow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rates_body(5, 0.07)))
        .mount(&server)
        .await;

    let client = RateHistoryClient::new(&config_for(&server)).unwrap();
    let history = client.fetch_rate_history("SOL", 30).await.unwrap();

    assert_eq!(history.deposit.len(), 30);
    assert_eq!(history.borrow.len(), 5);
    // The newest 30 of 40 daily entries start at index 10
    assert_eq!(history.deposit[0].timestamp, 1_700_000_000 + 10 * 86_400);
    assert_eq!(history.side(RateKind::Borrow)[0].rate, 0.07);
    assert!(history.borrow[0].apy > 0.07);
}

#[tokio::test]
async fn test_failed_side_is_empty_other_side_survives() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats/JLP/rateHistory/deposit"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stats/JLP/rateHistory/borrow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rates_body(3, 0.1)))
        .mount(&server)
        .await;

    let client = RateHistoryClient::new(&config_for(&server)).unwrap();
    let history = client.fetch_rate_history("JLP", 30).await.unwrap();

    assert!(history.deposit.is_empty());
    assert_eq!(history.borrow.len(), 3);
}

#[tokio::test]
async fn test_numeric_rates_are_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "rates": [[1_700_000_000, 0.05]] })),
        )
        .mount(&server)
        .await;

    let client = RateHistoryClient::new(&config_for(&server)).unwrap();
    let history = client.fetch_rate_history("USDC", 30).await.unwrap();

    assert_eq!(history.deposit.len(), 1);
    assert_eq!(history.deposit[0].rate, 0.05);
}

#[tokio::test]
async fn test_history_is_served_from_cache_until_cleared() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats/SOL/rateHistory/deposit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rates_body(2, 0.02)))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stats/SOL/rateHistory/borrow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rates_body(2, 0.04)))
        .expect(2)
        .mount(&server)
        .await;

    let client = RateHistoryClient::new(&config_for(&server)).unwrap();
    client.fetch_rate_history("SOL", 30).await.unwrap();
    client.fetch_rate_history("SOL", 1).await.unwrap();

    client.clear_cache();
    let history = client.fetch_rate_history("SOL", 30).await.unwrap();
    assert_eq!(history.deposit.len(), 2);

    server.verify().await;
}

#[tokio::test]
async fn test_retries_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats/SOL/rateHistory/deposit"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rates_body(1, 0.02)))
        .mount(&server)
        .await;

    let config = RatesConfig {
        retry_attempts: 3,
        ..config_for(&server)
    };
    let client = RateHistoryClient::new(&config).unwrap();
    let history = client.fetch_rate_history("SOL", 30).await.unwrap();

    assert_eq!(history.deposit.len(), 1);
    assert_eq!(history.borrow.len(), 1);
}
