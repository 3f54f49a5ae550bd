// Integration tests for the token exchange endpoint

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use deskbridge::api::{create_exchange_router, ExchangeAppState};
use deskbridge::oauth::exchange::ExchangeClient;
use deskbridge::oauth::provider::{GrantStyle, ProviderConfig};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_provider() -> ProviderConfig {
    ProviderConfig {
        domain: "zendesk.com".to_string(),
        client_id: "zdg-deskbridge".to_string(),
        client_secret: None,
        scopes: vec!["read".to_string(), "write".to_string()],
        grant_style: GrantStyle::Pkce,
        redirect_uri: "https://dashboard.stripe.com/test/apps-oauth/com.example.deskbridge"
            .to_string(),
    }
}

fn create_test_app(endpoint_base: Option<String>) -> Router {
    let provider = test_provider();
    let exchange = Arc::new(ExchangeClient::new(&provider, Duration::from_secs(5)));

    create_exchange_router(ExchangeAppState {
        provider,
        exchange,
        endpoint_base,
    })
}

fn exchange_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/oauth/exchange")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_exchange_success() {
    let mut server = mockito::Server::new_async().await;

    let _token_mock = server
        .mock("POST", "/oauth/tokens")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "tok_123"}"#)
        .create_async()
        .await;
    let _profile_mock = server
        .mock("GET", "/api/v2/users/me.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"user": {"email": "a@b.com", "name": "Alice"}}"#)
        .create_async()
        .await;

    let app = create_test_app(Some(server.url()));

    let response = app
        .oneshot(exchange_request(
            r#"{"code": "auth_code_1", "verifier": "v-abc", "subdomain": "acme"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["access_token"], "tok_123");
    assert_eq!(json["email"], "a@b.com");
}

#[tokio::test]
async fn test_exchange_upstream_rejection_is_bad_gateway() {
    let mut server = mockito::Server::new_async().await;

    let _token_mock = server
        .mock("POST", "/oauth/tokens")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    let app = create_test_app(Some(server.url()));

    let response = app
        .oneshot(exchange_request(
            r#"{"code": "auth_code_replayed", "subdomain": "acme"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = response_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("invalid_grant"));
}

#[tokio::test]
async fn test_exchange_rejects_invalid_subdomain_before_network() {
    // No mock server at all: validation must fail before any upstream call
    let app = create_test_app(None);

    let response = app
        .oneshot(exchange_request(r#"{"code": "c", "subdomain": "   "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("subdomain"));
}
