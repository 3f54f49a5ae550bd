// Integration tests for the connection lifecycle API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use deskbridge::api::{create_connection_router, ConnectionAppState};
use deskbridge::connection::ConnectionManager;
use deskbridge::credentials::{SecretScope, SqliteSecretStore};
use deskbridge::oauth::exchange::ExchangeClient;
use deskbridge::oauth::handshake::HandshakeRegistry;
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
    let key = BASE64.encode([0u8; 32]);
    let store = Arc::new(SqliteSecretStore::new(":memory:", &key).unwrap());

    let provider = test_provider();
    let exchange = Arc::new(ExchangeClient::new(&provider, Duration::from_secs(5)));
    let mut manager = ConnectionManager::new(
        store,
        SecretScope::Account,
        provider,
        exchange,
        HandshakeRegistry::new(600),
    );
    if let Some(base) = endpoint_base {
        manager = manager.with_endpoint_base(base);
    }

    create_connection_router(ConnectionAppState {
        manager: Arc::new(manager),
    })
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_login_returns_authorize_url() {
    let app = create_test_app(None);

    let response = app
        .oneshot(post_json(
            "/api/connection/login",
            r#"{"subdomain": "acme", "email": "user@acme.com"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    let url = json["authorize_url"].as_str().unwrap();
    assert!(url.starts_with("https://acme.zendesk.com/oauth/authorizations/new?"));
    assert!(url.contains("response_type=code"));
    assert!(!json["state"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_rejects_blank_subdomain() {
    let app = create_test_app(None);

    let response = app
        .oneshot(post_json("/api/connection/login", r#"{"subdomain": "  "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_with_provider_error_is_bad_request() {
    let app = create_test_app(None);

    let response = app
        .oneshot(get(
            "/api/connection/callback?error=access_denied&error_description=User+cancelled",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("access_denied"));
}

#[tokio::test]
async fn test_callback_with_forged_state_is_unauthorized() {
    let app = create_test_app(None);

    let response = app
        .clone()
        .oneshot(post_json("/api/connection/login", r#"{"subdomain": "acme"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/api/connection/callback?code=c1&state=forged"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_starts_checking() {
    let app = create_test_app(None);

    let response = app.oneshot(get("/api/connection/status")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["status"], "checking");
    assert_eq!(json["connected"], false);
}

#[tokio::test]
async fn test_full_cycle_over_http() {
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

    // Start the login to obtain a state token
    let response = app
        .clone()
        .oneshot(post_json("/api/connection/login", r#"{"subdomain": "acme"}"#))
        .await
        .unwrap();
    let login = response_json(response).await;
    let state = login["state"].as_str().unwrap().to_string();

    // Simulated provider redirect
    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/connection/callback?code=auth_code_1&state={}",
            state
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["success"], true);

    // Status now reports the connection, without the token
    let response = app
        .clone()
        .oneshot(get("/api/connection/status"))
        .await
        .unwrap();
    let json = response_json(response).await;
    assert_eq!(json["status"], "connected");
    assert_eq!(json["connected"], true);
    assert_eq!(json["subdomain"], "acme");
    assert_eq!(json["user_email"], "a@b.com");
    assert!(json.get("access_token").is_none());

    // Disconnect and verify the round trip back to disconnected
    let response = app
        .clone()
        .oneshot(post_json("/api/connection/disconnect", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/connection/status")).await.unwrap();
    let json = response_json(response).await;
    assert_eq!(json["status"], "disconnected");
    assert_eq!(json["connected"], false);
}

#[tokio::test]
async fn test_disconnect_is_idempotent_over_http() {
    let app = create_test_app(None);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json("/api/connection/disconnect", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["success"], true);
    }
}
