//! # Key Derivation
//!
//! Turns a user's password into the symmetric key that protects their
//! identity private key at rest.
//!
//! ## Derivation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      PASSWORD → WRAPPING KEY                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────────┐      ┌──────────────────────┐                 │
//! │  │  password (UTF-8)    │      │  salt (16 bytes)     │                 │
//! │  │  never stored        │      │  random per user,    │                 │
//! │  │                      │      │  stored as base64    │                 │
//! │  └──────────┬───────────┘      └──────────┬───────────┘                 │
//! │             └──────────────┬──────────────┘                             │
//! │                            ▼                                            │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  PBKDF2-HMAC-SHA256(                                            │   │
//! │  │    password   = password bytes,                                 │   │
//! │  │    salt       = salt,                                           │   │
//! │  │    iterations = 100 000,                                        │   │
//! │  │    length     = 32 bytes                                        │   │
//! │  │  )                                                              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                ▼                                        │
//! │                  WrappingKey (AES-256-GCM, memory only)                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The iteration count and hash are fixed constants. Changing either
//! changes the key derived from every stored salt, which would lock every
//! existing user out of their vault.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::Hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use super::encryption::{EncryptionKey, KEY_SIZE};
use crate::error::{Error, Result};

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length in bytes
pub const SALT_SIZE: usize = 16;

/// Per-user random salt for password derivation
///
/// Salts are not secret; they travel with the wrapped private key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    /// Generate a fresh salt from the OS CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, rejecting anything that is not exactly 16 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SALT_SIZE] = bytes.try_into().map_err(|_| {
            Error::Validation(format!(
                "salt must be {} bytes, got {}",
                SALT_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Decode from standard base64
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64.decode(encoded)?;
        Self::from_slice(&bytes)
    }

    /// Encode as standard base64
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// Symmetric key derived from a password
///
/// Only ever used to wrap and unwrap the identity private key. Never
/// persisted. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct WrappingKey(EncryptionKey);

impl WrappingKey {
    pub(crate) fn encryption_key(&self) -> &EncryptionKey {
        &self.0
    }
}

/// Derive the wrapping key for `password` and `salt`
///
/// Deterministic: the same inputs always produce the same key. Rejecting
/// empty passwords is left to the registration and login entry points.
pub fn derive_wrapping_key(password: &str, salt: &Salt) -> Result<WrappingKey> {
    let key = pbkdf2_sha256(password.as_bytes(), salt.as_bytes(), PBKDF2_ITERATIONS)?;
    Ok(WrappingKey(EncryptionKey::from_bytes(*key)))
}

fn pbkdf2_sha256(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let mut out = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, &mut out[..])
        .map_err(|e| Error::KeyDerivationFailed(format!("PBKDF2 failed: {}", e)))?;
    Ok(out)
}

/// Short SHA-256 fingerprint for identifying key material in logs
///
/// First 8 bytes of the digest, hex encoded.
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..8])
}

// ============================================================================
// TESTS
// ============================================================================
