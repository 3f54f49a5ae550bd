//! Connection lifecycle endpoints.
//!
//! Wires the [`ConnectionManager`] operations to HTTP for UI collaborators:
//! 1. POST /api/connection/login → authorization URL to navigate to
//! 2. User authorizes on the provider's site
//! 3. Provider redirects to GET /api/connection/callback
//! 4. Status is polled via GET /api/connection/status
//! 5. POST /api/connection/disconnect removes the stored credentials

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::connection::ConnectionManager;
use crate::error::ConnectionError;

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Application error types for connection endpoints
enum AppError {
    BadRequest(String),
    Unauthorized(String),
    ServerError(String),
    BadGateway(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

impl From<ConnectionError> for AppError {
    fn from(e: ConnectionError) -> Self {
        match &e {
            ConnectionError::Validation(_) => AppError::BadRequest(e.to_string()),
            ConnectionError::Handshake => AppError::Unauthorized(format!(
                "{} (possible CSRF attack)",
                e
            )),
            ConnectionError::MissingSubdomain => AppError::BadRequest(e.to_string()),
            ConnectionError::Store(_) => AppError::ServerError(e.to_string()),
            ConnectionError::Exchange(_) => AppError::BadGateway(e.to_string()),
        }
    }
}

/// Shared application state for connection API
#[derive(Clone)]
pub struct ConnectionAppState {
    pub manager: Arc<ConnectionManager>,
}

/// Request body for POST /api/connection/login
#[derive(Deserialize)]
pub struct LoginBody {
    subdomain: String,
    #[serde(default)]
    email: Option<String>,
}

/// Response for POST /api/connection/login
#[derive(Serialize)]
pub struct LoginResponse {
    authorize_url: String,
    state: String,
}

/// Authorization callback query parameters
#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Response for GET /api/connection/callback
#[derive(Serialize)]
pub struct CallbackResponse {
    success: bool,
    message: String,
}

/// Response for GET /api/connection/status
///
/// The access token is deliberately absent; collaborators that need it go
/// through the manager in-process.
#[derive(Serialize)]
pub struct StatusResponse {
    status: String,
    connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    subdomain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Response for POST /api/connection/disconnect
#[derive(Serialize)]
pub struct DisconnectResponse {
    success: bool,
}

/// Create connection API router
pub fn create_connection_router(state: ConnectionAppState) -> Router {
    Router::new()
        .route("/api/connection/login", post(connection_login))
        .route("/api/connection/callback", get(connection_callback))
        .route("/api/connection/status", get(connection_status))
        .route("/api/connection/disconnect", post(connection_disconnect))
        .with_state(Arc::new(state))
}

/// POST /api/connection/login
///
/// Validates the subdomain, persists it, and returns the provider
/// authorization URL for the caller to navigate the top-level context to.
async fn connection_login(
    State(state): State<Arc<ConnectionAppState>>,
    Json(body): Json<LoginBody>,
) -> Result<Json<LoginResponse>, AppError> {
    debug!(subdomain = %body.subdomain, "Login requested");

    let redirect = state
        .manager
        .initiate_login(&body.subdomain, body.email.as_deref())
        .await?;

    Ok(Json(LoginResponse {
        authorize_url: redirect.authorize_url,
        state: redirect.state,
    }))
}

/// GET /api/connection/callback
///
/// The provider's redirect target. Provider-reported errors (user denied
/// consent, misconfigured client) arrive as `error`/`error_description`
/// instead of a code and never reach the exchange.
async fn connection_callback(
    State(state): State<Arc<ConnectionAppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CallbackResponse>, AppError> {
    if let Some(error) = query.error {
        let description = query
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!(error = %error, description = %description, "Authorization failed");
        return Err(AppError::BadRequest(format!(
            "Authorization failed: {} - {}",
            error, description
        )));
    }

    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("Missing 'code' parameter".to_string()))?;
    let callback_state = query
        .state
        .ok_or_else(|| AppError::BadRequest("Missing 'state' parameter".to_string()))?;

    state.manager.handle_callback(&code, &callback_state).await?;

    Ok(Json(CallbackResponse {
        success: true,
        message: "Successfully connected Zendesk account".to_string(),
    }))
}

/// GET /api/connection/status
async fn connection_status(
    State(state): State<Arc<ConnectionAppState>>,
) -> Json<StatusResponse> {
    let snapshot = state.manager.snapshot();

    Json(StatusResponse {
        status: snapshot.status.name().to_string(),
        connected: snapshot.is_connected(),
        subdomain: snapshot.subdomain.clone(),
        user_email: snapshot.user_email.clone(),
        error: snapshot.error().map(str::to_string),
    })
}

/// POST /api/connection/disconnect
async fn connection_disconnect(
    State(state): State<Arc<ConnectionAppState>>,
) -> Result<Json<DisconnectResponse>, AppError> {
    state.manager.disconnect().await?;
    Ok(Json(DisconnectResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_query_deserialization() {
        // Success case
        let query = "code=auth_code_123&state=csrf_state_456";
        let callback: CallbackQuery = serde_urlencoded::from_str(query).unwrap();
        assert_eq!(callback.code, Some("auth_code_123".to_string()));
        assert_eq!(callback.state, Some("csrf_state_456".to_string()));
        assert_eq!(callback.error, None);

        // Error case
        let query = "error=access_denied&error_description=User+cancelled";
        let callback: CallbackQuery = serde_urlencoded::from_str(query).unwrap();
        assert_eq!(callback.error, Some("access_denied".to_string()));
        assert_eq!(
            callback.error_description,
            Some("User cancelled".to_string())
        );
        assert_eq!(callback.code, None);
    }

    #[test]
    fn test_status_response_never_carries_token() {
        let response = StatusResponse {
            status: "connected".to_string(),
            connected: true,
            subdomain: Some("acme".to_string()),
            user_email: Some("a@b.com".to_string()),
            error: None,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"connected\":true"));
        assert!(json.contains("\"subdomain\":\"acme\""));
        assert!(!json.contains("token"));
        assert!(!json.contains("error"));
    }
}
