//! Token exchange against the provider.
//!
//! Two sequential calls: POST the authorization code to the tenant's token
//! endpoint, then GET the authenticated profile with the fresh token. A
//! non-success response from either call is surfaced verbatim (status and
//! body) and nothing is retried here - a replayed authorization code would
//! be rejected upstream, so retries belong to the caller.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::provider::{GrantStyle, ProviderConfig, ProviderEndpoints};

/// Inputs for one code exchange.
#[derive(Clone, Debug)]
pub struct ExchangeRequest {
    /// Authorization code from the callback
    pub code: String,

    /// PKCE verifier paired with the challenge sent during authorization
    pub code_verifier: Option<String>,

    /// Tenant the code was issued by
    pub subdomain: String,

    /// Must match the redirect URI used in the authorization request
    pub redirect_uri: String,
}

/// Result of a successful exchange.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExchangeOutcome {
    pub access_token: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Exchange failure, upstream responses carried verbatim.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error("profile endpoint returned {status}: {body}")]
    ProfileEndpoint { status: u16, body: String },

    /// Connect failure, timeout, or a malformed response body
    #[error("exchange request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// OAuth token exchange request (Zendesk expects a JSON body)
#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    code: &'a str,
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
    redirect_uri: &'a str,
}

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ProfileResponse {
    user: ProfileUser,
}

#[derive(Deserialize, Debug)]
struct ProfileUser {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Client for the provider's token and profile endpoints.
pub struct ExchangeClient {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: Option<String>,
    grant_style: GrantStyle,
}

impl ExchangeClient {
    /// Create a client bound to the provider's OAuth app.
    ///
    /// The timeout applies to each upstream call separately; a hung provider
    /// surfaces as an error rather than stalling the caller.
    pub fn new(provider: &ProviderConfig, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http_client,
            client_id: provider.client_id.clone(),
            client_secret: provider.client_secret.clone(),
            grant_style: provider.grant_style,
        }
    }

    /// Exchange an authorization code for an access token, then fetch the
    /// authenticated user's profile with it.
    pub async fn exchange(
        &self,
        endpoints: &ProviderEndpoints,
        request: &ExchangeRequest,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        // The proof depends on the grant style: PKCE sends the verifier,
        // confidential clients send the secret
        let (client_secret, code_verifier) = match self.grant_style {
            GrantStyle::Pkce => (None, request.code_verifier.as_deref()),
            GrantStyle::ClientSecret => (self.client_secret.as_deref(), None),
        };

        let body = TokenRequest {
            grant_type: "authorization_code",
            code: &request.code,
            client_id: &self.client_id,
            client_secret,
            code_verifier,
            redirect_uri: &request.redirect_uri,
        };

        tracing::debug!(
            subdomain = %request.subdomain,
            token_url = %endpoints.token_url,
            "Exchanging authorization code"
        );

        let response = self
            .http_client
            .post(&endpoints.token_url)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ExchangeError::TokenEndpoint { status, body });
        }

        let token: TokenResponse = response.json().await?;

        tracing::debug!(
            token_type = ?token.token_type,
            scope = ?token.scope,
            "Token exchange successful, fetching profile"
        );

        let response = self
            .http_client
            .get(&endpoints.profile_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ExchangeError::ProfileEndpoint { status, body });
        }

        let profile: ProfileResponse = response.json().await?;

        Ok(ExchangeOutcome {
            access_token: token.access_token,
            email: profile.user.email,
            name: profile.user.name,
        })
    }
}
