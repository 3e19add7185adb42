//! Wire-level tests for the telemetry cloud client, against a local mock
//! server. These pin down the upstream contract: the auth payload shape,
//! the duplicated token headers, and the error mapping for bad responses.

use std::time::Duration;

use heliod::cloud::{CloudClient, Endpoint, FetchError, TelemetryApi};
use helio_common::Config;
use httpmock::{Method::GET, Method::POST, MockServer};
use serde_json::json;

fn test_config(base: String) -> Config {
    Config {
        auth_account: "acct".to_string(),
        auth_password: "pw".to_string(),
        telemetry_base: base,
        request_timeout: Duration::from_secs(5),
        port: 0,
        require_token: false,
        strict_merge: false,
        directory: None,
        otp: None,
    }
}

#[tokio::test]
async fn acquire_token_posts_credentials() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/loginv2/auth")
                .json_body(json!({"authAccount": "acct", "authPassword": "pw"}));
            then.status(200).json_body(json!({"body": "tok-1"}));
        })
        .await;

    let client = CloudClient::new(&test_config(server.base_url())).unwrap();
    let token = client.acquire_token().await.unwrap();

    assert_eq!(token, "tok-1");
    mock.assert_async().await;
}

#[tokio::test]
async fn acquire_token_maps_http_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/loginv2/auth");
            then.status(500);
        })
        .await;

    let client = CloudClient::new(&test_config(server.base_url())).unwrap();
    let err = client.acquire_token().await.unwrap_err();
    assert!(matches!(err, FetchError::Status(500)));
}

#[tokio::test]
async fn acquire_token_requires_body_field() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/loginv2/auth");
            then.status(200).json_body(json!({"code": "OK"}));
        })
        .await;

    let client = CloudClient::new(&test_config(server.base_url())).unwrap();
    let err = client.acquire_token().await.unwrap_err();
    assert!(matches!(err, FetchError::MissingBody));
}

/// The token must travel in both the bearer header and the bare `token`
/// header; the upstream rejects requests missing either one.
#[tokio::test]
async fn fetch_sends_token_in_both_headers() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/device/queryDeviceRealtimeData")
                .header("authorization", "Bearer tok-1")
                .header("token", "tok-1")
                .query_param("deviceSn", "SN123");
            then.status(200).json_body(json!({"body": {"power": 5}}));
        })
        .await;

    let client = CloudClient::new(&test_config(server.base_url())).unwrap();
    let body = client
        .fetch(
            Endpoint::Realtime,
            "tok-1",
            &[("deviceSn", "SN123".to_string())],
        )
        .await
        .unwrap();

    assert_eq!(body, json!({"power": 5}));
    mock.assert_async().await;
}

#[tokio::test]
async fn fetch_maps_http_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/device/queryDayAggregateValues");
            then.status(502);
        })
        .await;

    let client = CloudClient::new(&test_config(server.base_url())).unwrap();
    let err = client
        .fetch(Endpoint::DayAggregate, "tok", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status(502)));
}

#[tokio::test]
async fn fetch_requires_body_envelope() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/device/queryMonthAggregateValues");
            then.status(200).json_body(json!({"code": "OK"}));
        })
        .await;

    let client = CloudClient::new(&test_config(server.base_url())).unwrap();
    let err = client
        .fetch(Endpoint::MonthAggregate, "tok", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::MissingBody));
}

#[tokio::test]
async fn fetch_captures_connection_failure() {
    // Nothing listens on this port; the client must fold the connection
    // error into FetchError instead of panicking.
    let client = CloudClient::new(&test_config("http://127.0.0.1:1".to_string())).unwrap();
    let err = client.fetch(Endpoint::Realtime, "tok", &[]).await.unwrap_err();
    assert!(matches!(err, FetchError::Network(_)));
}
