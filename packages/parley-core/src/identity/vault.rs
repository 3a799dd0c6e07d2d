//! Private key vault.
//!
//! The identity private key is stored only as
//! `base64(iv ‖ AES-256-GCM(wrapping_key, PKCS#8 DER) ‖ tag)`. The wrapping
//! key comes from the user's password, so the server holding this blob can
//! never read the key inside it.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::crypto::{open, seal, IdentityPrivateKey, WrappingKey};
use crate::error::{Error, Result};

/// A vault-wrapped private key, as stored and transmitted
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WrappedPrivateKey(String);

impl WrappedPrivateKey {
    /// Wrap an encoded value received from storage or the account service
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The base64 text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for WrappedPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WrappedPrivateKey({} chars)", self.0.len())
    }
}

/// Encrypt `private` under `wrapping_key`
pub fn wrap(private: &IdentityPrivateKey, wrapping_key: &WrappingKey) -> Result<WrappedPrivateKey> {
    let der = private.to_pkcs8_der()?;
    let sealed = seal(wrapping_key.encryption_key(), &der)?;
    Ok(WrappedPrivateKey(BASE64.encode(sealed)))
}

/// Decrypt a wrapped private key
///
/// A wrong wrapping key (wrong password or salt) and a tampered blob both
/// fail the tag check and return `Authentication`. The plaintext is parsed
/// as PKCS#8 only after the tag verifies.
pub fn unwrap(
    wrapped: &WrappedPrivateKey,
    wrapping_key: &WrappingKey,
) -> Result<IdentityPrivateKey> {
    let sealed = BASE64.decode(wrapped.0.trim())?;
    let der = open(wrapping_key.encryption_key(), &sealed)?;

    IdentityPrivateKey::from_pkcs8_der(&der)
        .map_err(|_| Error::Validation("vault contents are not a PKCS#8 private key".into()))
}
