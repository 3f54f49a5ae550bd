//! OAuth 2.0 authorization-code flow against the Zendesk tenant.
//!
//! The flow, end to end:
//! 1. UI collaborator calls `initiate_login` with a tenant subdomain
//! 2. Subdomain is persisted, a handshake (state + optional PKCE pair) is
//!    registered, and the caller navigates to the authorization URL
//! 3. User consents on the provider's site
//! 4. Provider redirects back with `code` and `state`
//! 5. Code is exchanged for an access token, the profile is fetched,
//!    and credentials land in the secret store
//!
//! This module holds the provider endpoints, the handshake registry, and the
//! exchange client; the state machine that drives them lives in
//! [`crate::connection`].

pub mod exchange;
pub mod handshake;
pub mod provider;

pub use exchange::{ExchangeClient, ExchangeError, ExchangeOutcome, ExchangeRequest};
pub use handshake::{run_handshake_cleanup, Handshake, HandshakeRegistry};
pub use provider::{normalize_subdomain, GrantStyle, ProviderConfig, ProviderEndpoints};
