//! Secret-backed connection credentials.
//!
//! The connection to a Zendesk account is persisted as three named secrets
//! (subdomain, access token, user email) under an account- or user-level
//! scope. The [`SecretStore`] trait is the boundary to whatever service holds
//! them; the shipped backend is [`SqliteSecretStore`], which encrypts every
//! payload at rest with AES-256-GCM.
//!
//! # Consistency discipline
//!
//! At most one connection exists per scope. Callers rotate secrets with
//! delete-then-create rather than upsert, and deleting an absent secret is
//! success so disconnect stays idempotent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod encryption;
mod storage;

pub use encryption::{open, seal, validate_key, SealedSecret};
pub use storage::SqliteSecretStore;

use anyhow::Result;

/// Secret name holding the tenant subdomain.
pub const SUBDOMAIN_SECRET: &str = "zendesk_subdomain";

/// Secret name holding the OAuth access token.
pub const ACCESS_TOKEN_SECRET: &str = "zendesk_access_token";

/// Secret name holding the Zendesk account email.
pub const USER_EMAIL_SECRET: &str = "zendesk_user_email";

/// Every secret name that makes up one connection record.
pub const CONNECTION_SECRET_NAMES: [&str; 3] =
    [ACCESS_TOKEN_SECRET, SUBDOMAIN_SECRET, USER_EMAIL_SECRET];

/// Scope a secret is stored under.
///
/// A deployment picks one scope and uses it consistently: account-wide for a
/// shared connection, per-user when each dashboard user links their own
/// Zendesk account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SecretScope {
    Account,
    User(String),
}

impl SecretScope {
    /// Stable key used to partition secrets in storage.
    pub fn key(&self) -> String {
        match self {
            SecretScope::Account => "account".to_string(),
            SecretScope::User(id) => format!("user:{}", id),
        }
    }
}

/// A named secret as returned by [`SecretStore::list`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub payload: String,
}

/// Credentials for the connected Zendesk account.
///
/// Written as one logical unit after a successful token exchange and removed
/// as one logical unit on disconnect.
///
/// # Security
/// - The access token is never logged or displayed in full
/// - Never expose credentials via public API responses
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionCredentials {
    /// Tenant subdomain of the connected Zendesk instance
    pub subdomain: String,

    /// Opaque bearer token for the Zendesk API
    pub access_token: String,

    /// Zendesk account email, informational only
    pub user_email: Option<String>,
}

impl ConnectionCredentials {
    /// Reassemble credentials from a scope's secret listing.
    ///
    /// Returns `None` unless both the subdomain and the access token are
    /// present; a partial record is not a connection.
    pub fn from_secrets(secrets: &[Secret]) -> Option<Self> {
        let payload_of = |name: &str| {
            secrets
                .iter()
                .find(|s| s.name == name)
                .map(|s| s.payload.clone())
        };

        Some(Self {
            subdomain: payload_of(SUBDOMAIN_SECRET)?,
            access_token: payload_of(ACCESS_TOKEN_SECRET)?,
            user_email: payload_of(USER_EMAIL_SECRET),
        })
    }
}

/// Boundary trait over the external secret service.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// List every secret stored under a scope.
    async fn list(&self, scope: &SecretScope) -> Result<Vec<Secret>>;

    /// Create a named secret. Fails if the name already exists in the scope;
    /// rotation is delete-then-create.
    async fn create(&self, scope: &SecretScope, name: &str, payload: &str) -> Result<()>;

    /// Delete a named secret if present.
    ///
    /// Returns `Ok(true)` when a secret was removed and `Ok(false)` when none
    /// existed; only a storage failure is an error.
    async fn delete_where(&self, scope: &SecretScope, name: &str) -> Result<bool>;
}
