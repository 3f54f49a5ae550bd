//! Connection lifecycle for the Zendesk account link.
//!
//! State machine driven by UI collaborators:
//!
//! ```text
//! Checking ──────► Disconnected ──initiate_login──► Connecting
//!    │                   ▲                              │
//!    │                   │ disconnect          callback │
//!    ▼                   │                              ▼
//! Connected ◄────────────┴──────────────── Connected | Error
//!                                                       │
//!                                        retry login ◄──┘
//! ```
//!
//! `Checking` is the only initial state; the component is long-lived with no
//! terminal state. Every operation is recoverable by re-invoking
//! `initiate_login` or `disconnect`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::credentials::{
    ConnectionCredentials, SecretScope, SecretStore, ACCESS_TOKEN_SECRET,
    CONNECTION_SECRET_NAMES, SUBDOMAIN_SECRET, USER_EMAIL_SECRET,
};
use crate::error::ConnectionError;
use crate::oauth::exchange::{ExchangeClient, ExchangeRequest};
use crate::oauth::handshake::HandshakeRegistry;
use crate::oauth::provider::{normalize_subdomain, ProviderConfig, ProviderEndpoints};

/// Connection status exposed to UI collaborators.
///
/// Strictly one of these at any time; there is no half-connected state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Stored credentials are being looked up
    Checking,
    Disconnected,
    /// Authorization redirect issued or exchange in flight
    Connecting,
    Connected,
    /// Something failed; the reason is shown next to a retry affordance
    Error(String),
}

impl ConnectionStatus {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionStatus::Checking => "checking",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error(_) => "error",
        }
    }
}

/// Point-in-time view of the connection.
#[derive(Clone, Debug)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    pub subdomain: Option<String>,
    pub access_token: Option<String>,
    pub user_email: Option<String>,
}

impl ConnectionSnapshot {
    fn initial() -> Self {
        Self {
            status: ConnectionStatus::Checking,
            subdomain: None,
            access_token: None,
            user_email: None,
        }
    }

    fn cleared(status: ConnectionStatus) -> Self {
        Self {
            status,
            subdomain: None,
            access_token: None,
            user_email: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.status, ConnectionStatus::Connected)
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.status,
            ConnectionStatus::Checking | ConnectionStatus::Connecting
        )
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            ConnectionStatus::Error(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Returned by `initiate_login`: the caller navigates the top-level context
/// to `authorize_url`.
#[derive(Clone, Debug)]
pub struct LoginRedirect {
    pub authorize_url: String,
    pub state: String,
}

/// Drives the OAuth connection between a secret store and the provider.
///
/// Owns the stored [`ConnectionCredentials`](crate::credentials::ConnectionCredentials)
/// exclusively; the store is a passive persistence collaborator.
pub struct ConnectionManager {
    store: Arc<dyn SecretStore>,
    scope: SecretScope,
    provider: ProviderConfig,
    exchange: Arc<ExchangeClient>,
    handshakes: HandshakeRegistry,
    // Replay guard: authorization codes already submitted for exchange
    attempted_codes: Mutex<HashSet<String>>,
    snapshot: Mutex<ConnectionSnapshot>,
    endpoint_base: Option<String>,
}

impl ConnectionManager {
    pub fn new(
        store: Arc<dyn SecretStore>,
        scope: SecretScope,
        provider: ProviderConfig,
        exchange: Arc<ExchangeClient>,
        handshakes: HandshakeRegistry,
    ) -> Self {
        Self {
            store,
            scope,
            provider,
            exchange,
            handshakes,
            attempted_codes: Mutex::new(HashSet::new()),
            snapshot: Mutex::new(ConnectionSnapshot::initial()),
            endpoint_base: None,
        }
    }

    /// Use a fixed endpoint base instead of deriving
    /// `https://{subdomain}.{domain}` (for testing with a mock server).
    pub fn with_endpoint_base(mut self, base: impl Into<String>) -> Self {
        self.endpoint_base = Some(base.into());
        self
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.snapshot.lock().unwrap().clone()
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.snapshot.lock().unwrap().status = status;
    }

    fn endpoints_for(&self, subdomain: &str) -> ProviderEndpoints {
        match &self.endpoint_base {
            Some(base) => ProviderEndpoints::from_base(base),
            None => self.provider.endpoints(subdomain),
        }
    }

    /// Look up stored credentials and settle into `Connected` or
    /// `Disconnected`.
    ///
    /// A store failure is logged and treated as `Disconnected`: an
    /// unverifiable connection is never reported as connected.
    pub async fn check_existing_connection(&self) {
        let secrets = match self.store.list(&self.scope).await {
            Ok(secrets) => secrets,
            Err(e) => {
                warn!(error = %e, "Failed to read stored credentials");
                *self.snapshot.lock().unwrap() =
                    ConnectionSnapshot::cleared(ConnectionStatus::Disconnected);
                return;
            }
        };

        let mut snapshot = self.snapshot.lock().unwrap();
        match ConnectionCredentials::from_secrets(&secrets) {
            Some(creds) => {
                info!(subdomain = %creds.subdomain, "Existing connection found");
                *snapshot = ConnectionSnapshot {
                    status: ConnectionStatus::Connected,
                    subdomain: Some(creds.subdomain),
                    access_token: Some(creds.access_token),
                    user_email: creds.user_email,
                };
            }
            None => {
                debug!("No stored connection");
                *snapshot = ConnectionSnapshot::cleared(ConnectionStatus::Disconnected);
            }
        }
    }

    /// Validate the subdomain, persist it, and produce the authorization URL
    /// for the caller to navigate to.
    ///
    /// The subdomain is stored *before* the redirect: navigation discards
    /// all in-memory context, and the callback cannot exchange without it.
    /// Validation failures touch neither the store nor the network.
    pub async fn initiate_login(
        &self,
        subdomain: &str,
        email: Option<&str>,
    ) -> Result<LoginRedirect, ConnectionError> {
        let subdomain = normalize_subdomain(subdomain)?;
        let email = email.map(str::trim).filter(|e| !e.is_empty());

        if let Err(e) = self.rotate_and_store(&subdomain, email).await {
            let err = ConnectionError::Store(e.to_string());
            self.set_status(ConnectionStatus::Error(err.to_string()));
            return Err(err);
        }

        let handshake = self.handshakes.begin(self.provider.grant_style);
        let authorize_url = self.provider.authorize_url(&subdomain, &handshake);

        {
            let mut snapshot = self.snapshot.lock().unwrap();
            snapshot.status = ConnectionStatus::Connecting;
            snapshot.subdomain = Some(subdomain.clone());
            snapshot.user_email = email.map(str::to_string);
        }

        info!(subdomain = %subdomain, "Authorization redirect prepared");

        Ok(LoginRedirect {
            authorize_url,
            state: handshake.state,
        })
    }

    // A new login supersedes any previous connection: delete-then-create,
    // never merge.
    async fn rotate_and_store(&self, subdomain: &str, email: Option<&str>) -> anyhow::Result<()> {
        for name in CONNECTION_SECRET_NAMES {
            self.store.delete_where(&self.scope, name).await?;
        }

        self.store
            .create(&self.scope, SUBDOMAIN_SECRET, subdomain)
            .await?;

        if let Some(email) = email {
            self.store
                .create(&self.scope, USER_EMAIL_SECRET, email)
                .await?;
        }

        Ok(())
    }

    /// Complete the handshake after the provider redirects back.
    ///
    /// Exactly-once per authorization code: a code that was already
    /// submitted for exchange is silently ignored (duplicate deliveries are
    /// usually re-renders, and providers reject replays anyway). A failed
    /// exchange clears the guard entry so the user may retry.
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<(), ConnectionError> {
        {
            let mut attempted = self.attempted_codes.lock().unwrap();
            if !attempted.insert(code.to_string()) {
                debug!("Ignoring callback for an already-attempted code");
                return Ok(());
            }
        }

        match self.run_exchange(code, state).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.attempted_codes.lock().unwrap().remove(code);
                self.set_status(ConnectionStatus::Error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_exchange(&self, code: &str, state: &str) -> Result<(), ConnectionError> {
        let handshake = self
            .handshakes
            .consume(state)
            .ok_or(ConnectionError::Handshake)?;

        self.set_status(ConnectionStatus::Connecting);

        let secrets = self
            .store
            .list(&self.scope)
            .await
            .map_err(|e| ConnectionError::Store(e.to_string()))?;

        // The subdomain was stored before the redirect; without it the
        // exchange has no tenant to talk to
        let subdomain = secrets
            .iter()
            .find(|s| s.name == SUBDOMAIN_SECRET)
            .map(|s| s.payload.clone())
            .ok_or(ConnectionError::MissingSubdomain)?;
        let stored_email = secrets
            .iter()
            .find(|s| s.name == USER_EMAIL_SECRET)
            .map(|s| s.payload.clone());

        let request = ExchangeRequest {
            code: code.to_string(),
            code_verifier: handshake.code_verifier,
            subdomain: subdomain.clone(),
            redirect_uri: self.provider.redirect_uri.clone(),
        };

        let outcome = self
            .exchange
            .exchange(&self.endpoints_for(&subdomain), &request)
            .await?;

        self.store
            .delete_where(&self.scope, ACCESS_TOKEN_SECRET)
            .await
            .map_err(|e| ConnectionError::Store(e.to_string()))?;
        self.store
            .create(&self.scope, ACCESS_TOKEN_SECRET, &outcome.access_token)
            .await
            .map_err(|e| ConnectionError::Store(e.to_string()))?;

        // The profile email is authoritative; fall back to what the user
        // typed at login
        let user_email = outcome.email.clone().or(stored_email);
        if let Some(email) = &outcome.email {
            self.store
                .delete_where(&self.scope, USER_EMAIL_SECRET)
                .await
                .map_err(|e| ConnectionError::Store(e.to_string()))?;
            self.store
                .create(&self.scope, USER_EMAIL_SECRET, email)
                .await
                .map_err(|e| ConnectionError::Store(e.to_string()))?;
        }

        info!(subdomain = %subdomain, "Connection established");

        *self.snapshot.lock().unwrap() = ConnectionSnapshot {
            status: ConnectionStatus::Connected,
            subdomain: Some(subdomain),
            access_token: Some(outcome.access_token),
            user_email,
        };

        Ok(())
    }

    /// Remove stored credentials and return to `Disconnected`.
    ///
    /// Deleting an absent secret is success, so disconnect is idempotent.
    /// If the store fails, in-memory credentials are cleared regardless: the
    /// session must never claim a token the store may no longer hold.
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        let mut store_failure: Option<anyhow::Error> = None;

        for name in CONNECTION_SECRET_NAMES {
            if let Err(e) = self.store.delete_where(&self.scope, name).await {
                warn!(secret = name, error = %e, "Failed to delete secret");
                store_failure.get_or_insert(e);
            }
        }

        self.attempted_codes.lock().unwrap().clear();

        let status = match &store_failure {
            Some(e) => ConnectionStatus::Error(format!("disconnect incomplete: {}", e)),
            None => ConnectionStatus::Disconnected,
        };
        *self.snapshot.lock().unwrap() = ConnectionSnapshot::cleared(status);

        match store_failure {
            Some(e) => Err(ConnectionError::Store(e.to_string())),
            None => {
                info!("Disconnected");
                Ok(())
            }
        }
    }
}
