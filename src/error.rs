//! Error taxonomy for connection operations.
//!
//! Validation failures are rejected before any store or network call. Store
//! and exchange failures carry a human-readable message suitable for showing
//! next to a retry affordance; no variant is fatal to the process.

use thiserror::Error;

use crate::oauth::exchange::ExchangeError;

/// Failure modes of the connection state machine.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Input rejected before any side effect.
    #[error("{0}")]
    Validation(String),

    /// Credential store read, write, or delete failure.
    #[error("credential store error: {0}")]
    Store(String),

    /// The stored subdomain vanished between redirect and callback.
    #[error("missing subdomain - please try connecting again")]
    MissingSubdomain,

    /// The callback's state parameter matched no pending handshake
    /// (expired, already consumed, or forged).
    #[error("invalid or expired authorization state")]
    Handshake,

    /// The token or profile endpoint rejected the exchange.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}
