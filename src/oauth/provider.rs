//! Provider endpoint configuration.
//!
//! Zendesk is tenant-addressed: every endpoint lives under
//! `https://{subdomain}.zendesk.com`, so URLs are derived per subdomain
//! rather than fixed at startup.

use serde::{Deserialize, Serialize};

use super::handshake::Handshake;
use crate::error::ConnectionError;

/// How the client proves itself during code exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStyle {
    /// Proof Key for Code Exchange; no client secret involved
    Pkce,
    /// Confidential client presenting a client secret
    ClientSecret,
}

/// OAuth configuration for the upstream provider.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Root domain tenant subdomains are prefixed to (e.g. "zendesk.com")
    pub domain: String,

    /// OAuth client ID (from environment variable)
    pub client_id: String,

    /// Client secret; required when `grant_style` is `ClientSecret`
    pub client_secret: Option<String>,

    /// Scopes requested during authorization
    pub scopes: Vec<String>,

    pub grant_style: GrantStyle,

    /// Redirect URI registered with the provider
    pub redirect_uri: String,
}

impl ProviderConfig {
    /// Build the authorization URL for a tenant.
    ///
    /// Carries `response_type=code`, the client id, redirect URI, scopes and
    /// the handshake's state token; PKCE handshakes add the S256 challenge.
    pub fn authorize_url(&self, subdomain: &str, handshake: &Handshake) -> String {
        let scopes = self.scopes.join(" ");
        let mut url = format!(
            "https://{}.{}/oauth/authorizations/new?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            subdomain,
            self.domain,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(&handshake.state),
        );

        if let Some(challenge) = handshake.code_challenge() {
            url.push_str(&format!(
                "&code_challenge={}&code_challenge_method=S256",
                urlencoding::encode(&challenge)
            ));
        }

        url
    }

    /// Resolve the token and profile endpoints for a tenant.
    pub fn endpoints(&self, subdomain: &str) -> ProviderEndpoints {
        ProviderEndpoints::from_base(&format!("https://{}.{}", subdomain, self.domain))
    }
}

/// Resolved per-tenant endpoint URLs.
#[derive(Clone, Debug)]
pub struct ProviderEndpoints {
    pub token_url: String,
    pub profile_url: String,
}

impl ProviderEndpoints {
    /// Build endpoints under an arbitrary base URL (for testing with a mock
    /// server).
    pub fn from_base(base: &str) -> Self {
        Self {
            token_url: format!("{}/oauth/tokens", base),
            profile_url: format!("{}/api/v2/users/me.json", base),
        }
    }
}

/// Normalize and validate a tenant subdomain.
///
/// Trims whitespace and lowercases, then requires a hostname label: ASCII
/// alphanumerics and hyphens, no leading or trailing hyphen. Rejection
/// happens before any store write or network call.
pub fn normalize_subdomain(raw: &str) -> Result<String, ConnectionError> {
    let subdomain = raw.trim().to_ascii_lowercase();

    if subdomain.is_empty() {
        return Err(ConnectionError::Validation(
            "Zendesk subdomain is required".to_string(),
        ));
    }

    let valid_label = subdomain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !subdomain.starts_with('-')
        && !subdomain.ends_with('-');

    if !valid_label {
        return Err(ConnectionError::Validation(format!(
            "'{}' is not a valid Zendesk subdomain",
            subdomain
        )));
    }

    Ok(subdomain)
}
