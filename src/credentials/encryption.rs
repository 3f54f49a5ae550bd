//! AES-256-GCM sealing of secret payloads.
//!
//! Every payload is sealed with a fresh random nonce. The master key is
//! 32 bytes, provided base64-encoded from an environment variable and held
//! in memory only.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Master key size in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// GCM nonce size in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// An encrypted payload together with the nonce that sealed it.
///
/// Both fields are base64-encoded for storage.
#[derive(Clone, Debug)]
pub struct SealedSecret {
    pub ciphertext: String,
    pub nonce: String,
}

/// Decode and validate a base64-encoded master key.
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>> {
    let key_bytes = BASE64
        .decode(key_base64)
        .context("Failed to decode base64 encryption key")?;

    if key_bytes.len() != KEY_SIZE {
        return Err(anyhow!(
            "Encryption key must be {} bytes (256 bits), got {} bytes",
            KEY_SIZE,
            key_bytes.len()
        ));
    }

    Ok(key_bytes)
}

/// Seal a payload under the master key with a fresh random nonce.
pub fn seal(payload: &str, key: &[u8]) -> Result<SealedSecret> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    // Nonce reuse under the same key breaks GCM; always draw a fresh one
    let nonce_bytes = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext_bytes = cipher
        .encrypt(&nonce_bytes, payload.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    Ok(SealedSecret {
        ciphertext: BASE64.encode(&ciphertext_bytes),
        nonce: BASE64.encode(&nonce_bytes),
    })
}

/// Open a sealed payload. Fails on a wrong key, wrong nonce, or tampering.
pub fn open(sealed: &SealedSecret, key: &[u8]) -> Result<String> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }

    let ciphertext_bytes = BASE64
        .decode(&sealed.ciphertext)
        .context("Failed to decode ciphertext")?;
    let nonce_bytes = BASE64
        .decode(&sealed.nonce)
        .context("Failed to decode nonce")?;

    if nonce_bytes.len() != NONCE_SIZE {
        return Err(anyhow!(
            "Invalid nonce size: expected {}, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    let plaintext_bytes = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext_bytes.as_ref())
        .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

    String::from_utf8(plaintext_bytes).context("Decrypted data is not valid UTF-8")
}
