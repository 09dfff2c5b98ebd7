//! Tests for the HTTP client module

use super::*;
use crate::auth::{Credential, CredentialManager};
use crate::error::Error;
use crate::types::{BackoffType, Method};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config(server: &MockServer) -> HttpClientConfig {
    HttpClientConfig::builder()
        .base_url(server.uri())
        .max_retries(2)
        .backoff(
            BackoffType::Exponential,
            Duration::from_millis(5),
            Duration::from_millis(20),
        )
        .no_rate_limit()
        .build()
}

fn refreshing_manager(server: &MockServer) -> Arc<CredentialManager> {
    Arc::new(CredentialManager::new(Credential::Refreshable {
        token_url: format!("{}/oauth/v1/token", server.uri()),
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        refresh_token: "rt".to_string(),
        access_token: None,
    }))
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.backoff_factor, 2);
    assert_eq!(config.initial_backoff, Duration::from_secs(1));
    assert_eq!(config.max_backoff, Duration::from_secs(60));
    assert!(config.base_url.is_none());
    assert!(config.rate_limit.is_some());
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("https://api.hubapi.com")
        .timeout(Duration::from_secs(60))
        .max_retries(3)
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(200),
            Duration::from_secs(30),
        )
        .backoff_factor(0)
        .header("X-Custom", "value")
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(config.base_url.as_deref(), Some("https://api.hubapi.com"));
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.backoff_type, BackoffType::Linear);
    assert_eq!(config.backoff_factor, 1);
    assert_eq!(
        config.default_headers.get("X-Custom"),
        Some(&"value".to_string())
    );
    assert_eq!(config.user_agent, "test-agent/1.0");
}

#[tokio::test]
async fn test_get_decodes_json_and_sends_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/deals"))
        .and(query_param("limit", "100"))
        .and(query_param("properties", "amount,dealname"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{"id": "1"}]
        })))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server)).unwrap();
    let response = client
        .request(
            Method::GET,
            "/crm/v3/objects/deals",
            RequestConfig::new()
                .query("limit", "100")
                .query("properties", "amount,dealname"),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body["results"][0]["id"], "1");
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let server = MockServer::start().await;
    let body = serde_json::json!({"limit": 100, "after": 0});

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts/search"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"total": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server)).unwrap();
    let value = client
        .post_json("/crm/v3/objects/contacts/search", body)
        .await
        .unwrap();

    assert_eq!(value["total"], 0);
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/settings/v3/users"))
        .and(header("Authorization", "Bearer pat-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let manager = Arc::new(CredentialManager::new(Credential::Static {
        access_token: "pat-123".to_string(),
    }));
    let client = HttpClient::with_credentials(fast_config(&server), manager).unwrap();

    client
        .get_json("/settings/v3/users", RequestConfig::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unauthorized_refreshes_and_retries_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "token-a",
            "expires_in": 1800
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "token-b",
            "expires_in": 1800
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/crm/v3/owners"))
        .and(header("Authorization", "Bearer token-a"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/owners"))
        .and(header("Authorization", "Bearer token-b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
        .expect(1)
        .mount(&server)
        .await;

    let manager = refreshing_manager(&server);
    let client = HttpClient::with_credentials(fast_config(&server), Arc::clone(&manager)).unwrap();

    let value = client
        .get_json("/crm/v3/owners", RequestConfig::new())
        .await
        .unwrap();

    assert_eq!(value["results"], serde_json::json!([]));
    assert_eq!(manager.refresh_count(), 2);
}

#[tokio::test]
async fn test_second_unauthorized_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "always-rejected",
            "expires_in": 1800
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/owners"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .expect(2)
        .mount(&server)
        .await;

    let client = HttpClient::with_credentials(fast_config(&server), refreshing_manager(&server))
        .unwrap();
    let err = client
        .get_json("/crm/v3/owners", RequestConfig::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth { .. }));
}

#[tokio::test]
async fn test_static_token_unauthorized_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/crm/v3/owners"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let manager = Arc::new(CredentialManager::new(Credential::Static {
        access_token: "pat".to_string(),
    }));
    let client = HttpClient::with_credentials(fast_config(&server), manager).unwrap();
    let err = client
        .get_json("/crm/v3/owners", RequestConfig::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth { .. }));
}

#[tokio::test]
async fn test_client_error_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/nope"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server)).unwrap();
    let err = client
        .get_json("/crm/v3/objects/nope", RequestConfig::new())
        .await
        .unwrap_err();

    match err {
        Error::Client { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "not found");
        }
        other => panic!("expected client error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_retry_on_server_error_then_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/crm/v3/owners"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/owners"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server)).unwrap();
    let value = client
        .get_json("/crm/v3/owners", RequestConfig::new())
        .await
        .unwrap();

    assert_eq!(value["ok"], true);
}

#[tokio::test]
async fn test_rate_limited_honors_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/crm/v3/owners"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/owners"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server)).unwrap();
    let value = client
        .get_json("/crm/v3/owners", RequestConfig::new())
        .await
        .unwrap();

    assert_eq!(value["ok"], true);
}

#[tokio::test]
async fn test_exhausted_retries_are_transient_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/crm/v3/owners"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server)).unwrap();
    let err = client
        .get_json("/crm/v3/owners", RequestConfig::new())
        .await
        .unwrap_err();

    match err {
        Error::Transient {
            attempts, status, ..
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(status, Some(503));
        }
        other => panic!("expected transient error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_json_is_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/crm/v3/owners"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server)).unwrap();
    let err = client
        .get_json("/crm/v3/owners", RequestConfig::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Protocol { .. }));
}

#[tokio::test]
async fn test_empty_body_is_null() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server)).unwrap();
    let response = client
        .request(Method::GET, "/empty", RequestConfig::new())
        .await
        .unwrap();

    assert_eq!(response.status, 204);
    assert!(response.body.is_null());
}

#[tokio::test]
async fn test_absolute_url_bypasses_base() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/absolute"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": 1})))
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url("http://unused.invalid")
        .no_rate_limit()
        .build();
    let client = HttpClient::with_config(config).unwrap();
    let value = client
        .get_json(&format!("{}/absolute", server.uri()), RequestConfig::new())
        .await
        .unwrap();

    assert_eq!(value["ok"], 1);
}

#[test]
fn test_calculate_backoff_constant() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
        .build();
    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(3), Duration::from_millis(100));
}

#[test]
fn test_calculate_backoff_exponential_with_factor() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Exponential,
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
        .backoff_factor(3)
        .build();
    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(1), Duration::from_millis(300));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(900));
}

#[test]
fn test_calculate_backoff_respects_max() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Exponential,
            Duration::from_secs(1),
            Duration::from_secs(5),
        )
        .build();
    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(client.calculate_backoff(10), Duration::from_secs(5));
    assert_eq!(client.calculate_backoff(40), Duration::from_secs(5));
}

#[test]
fn test_http_client_debug_hides_credentials() {
    let manager = Arc::new(CredentialManager::new(Credential::Static {
        access_token: "secret-token".to_string(),
    }));
    let client = HttpClient::with_credentials(HttpClientConfig::default(), manager).unwrap();
    let debug = format!("{client:?}");

    assert!(debug.contains("HttpClient"));
    assert!(!debug.contains("secret-token"));
    assert!(client.has_rate_limiter());
}
