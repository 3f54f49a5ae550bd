//! Handshake state for the authorization redirect round trip.
//!
//! The `state` token correlates the callback with the login that started it
//! (anti-CSRF); the optional PKCE verifier/challenge pair protects the
//! authorization code against interception. Handshake state is held
//! server-side keyed by `state` - it survives the redirect without being
//! smuggled through the provider - and each entry is single-use: consuming
//! it removes it, so a replayed callback fails validation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::provider::GrantStyle;

/// Ephemeral state for one authorization round trip.
///
/// Never persisted; discarded once the exchange succeeds or fails.
#[derive(Clone, Debug)]
pub struct Handshake {
    /// Anti-CSRF correlation token, echoed back by the provider
    pub state: String,

    /// PKCE verifier, present only for `GrantStyle::Pkce`
    pub code_verifier: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Handshake {
    /// S256 challenge for the verifier, when one exists.
    pub fn code_challenge(&self) -> Option<String> {
        self.code_verifier.as_deref().map(s256_challenge)
    }
}

/// Derive the S256 code challenge from a verifier (RFC 7636).
pub fn s256_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Generate a PKCE verifier: 32 random bytes, base64url without padding
/// (43 characters, within the 43-128 bounds of RFC 7636).
fn generate_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Registry of pending handshakes with automatic expiration.
#[derive(Clone)]
pub struct HandshakeRegistry {
    pending: Arc<Mutex<HashMap<String, Handshake>>>,
    expiry: Duration,
}

impl HandshakeRegistry {
    /// Create a new registry.
    ///
    /// # Arguments
    /// * `expiry_seconds` - How long pending handshakes remain valid
    ///   (default deployment: 600 = 10 minutes)
    pub fn new(expiry_seconds: i64) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            expiry: Duration::seconds(expiry_seconds),
        }
    }

    /// Begin a handshake: a fresh state token (UUID v4), plus a PKCE
    /// verifier when the grant style asks for one.
    pub fn begin(&self, grant_style: GrantStyle) -> Handshake {
        let handshake = Handshake {
            state: Uuid::new_v4().to_string(),
            code_verifier: match grant_style {
                GrantStyle::Pkce => Some(generate_verifier()),
                GrantStyle::ClientSecret => None,
            },
            created_at: Utc::now(),
        };

        let mut pending = self.pending.lock().unwrap();
        pending.insert(handshake.state.clone(), handshake.clone());

        handshake
    }

    /// Validate and consume a handshake by its state token.
    ///
    /// Returns the handshake if present and not expired, `None` otherwise.
    /// The entry is removed either way it is found (single-use).
    pub fn consume(&self, state: &str) -> Option<Handshake> {
        let mut pending = self.pending.lock().unwrap();

        let handshake = pending.remove(state)?;

        if Utc::now() - handshake.created_at > self.expiry {
            return None;
        }

        Some(handshake)
    }

    /// Drop expired entries (called periodically).
    pub fn cleanup_expired(&self) {
        let mut pending = self.pending.lock().unwrap();
        let now = Utc::now();

        pending.retain(|_, handshake| now - handshake.created_at <= self.expiry);
    }

    /// Number of pending handshakes (for monitoring).
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

/// Background task to periodically drop expired handshakes.
pub async fn run_handshake_cleanup(registry: HandshakeRegistry, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        registry.cleanup_expired();
        tracing::debug!(
            "Handshake cleanup complete, {} pending",
            registry.pending_count()
        );
    }
}
