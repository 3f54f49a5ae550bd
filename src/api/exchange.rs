//! Token exchange endpoint.
//!
//! The network-facing half of the connection flow: a dashboard-side caller
//! posts the authorization code (and PKCE verifier) here, and this service
//! brokers it against the tenant's token endpoint, fetches the authenticated
//! profile, and returns both. Stateless: no retries, no storage.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::oauth::exchange::{ExchangeClient, ExchangeRequest};
use crate::oauth::provider::{normalize_subdomain, ProviderConfig, ProviderEndpoints};

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Application error types for the exchange endpoint
enum AppError {
    BadRequest(String),
    BadGateway(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

/// Shared application state for the exchange API
#[derive(Clone)]
pub struct ExchangeAppState {
    pub provider: ProviderConfig,
    pub exchange: Arc<ExchangeClient>,
    /// Overrides per-tenant endpoint derivation (tests)
    pub endpoint_base: Option<String>,
}

/// Request body for POST /oauth/exchange
#[derive(Deserialize)]
pub struct ExchangeBody {
    code: String,
    #[serde(default)]
    verifier: Option<String>,
    subdomain: String,
    /// Defaults to the configured redirect URI when absent
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Response for POST /oauth/exchange
#[derive(Serialize)]
pub struct ExchangeResponse {
    success: bool,
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

/// Create exchange API router
pub fn create_exchange_router(state: ExchangeAppState) -> Router {
    Router::new()
        .route("/oauth/exchange", post(exchange_token))
        .with_state(Arc::new(state))
}

/// POST /oauth/exchange
///
/// Exchanges an authorization code for an access token and the authenticated
/// user's profile. Upstream failures are passed through as 502 with the
/// provider's status and body.
async fn exchange_token(
    State(state): State<Arc<ExchangeAppState>>,
    Json(body): Json<ExchangeBody>,
) -> Result<Json<ExchangeResponse>, AppError> {
    let subdomain =
        normalize_subdomain(&body.subdomain).map_err(|e| AppError::BadRequest(e.to_string()))?;

    debug!(subdomain = %subdomain, "Exchange requested");

    let request = ExchangeRequest {
        code: body.code,
        code_verifier: body.verifier,
        subdomain: subdomain.clone(),
        redirect_uri: body
            .redirect_uri
            .unwrap_or_else(|| state.provider.redirect_uri.clone()),
    };

    let endpoints = match &state.endpoint_base {
        Some(base) => ProviderEndpoints::from_base(base),
        None => state.provider.endpoints(&subdomain),
    };

    let outcome = state
        .exchange
        .exchange(&endpoints, &request)
        .await
        .map_err(|e| {
            warn!(subdomain = %subdomain, error = %e, "Token exchange failed");
            AppError::BadGateway(format!("Failed to exchange authorization code: {}", e))
        })?;

    info!(
        subdomain = %subdomain,
        has_email = outcome.email.is_some(),
        "Token exchange completed"
    );

    Ok(Json(ExchangeResponse {
        success: true,
        access_token: outcome.access_token,
        email: outcome.email,
        name: outcome.name,
    }))
}
