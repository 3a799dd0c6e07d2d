//! # Key Management
//!
//! Per-user asymmetric identity keys.
//!
//! ## Key Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KEY TYPES                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  IdentityKeyPair (RSA-2048, e = 65537)                          │   │
//! │  │  ─────────────────────────────────────                           │   │
//! │  │                                                                  │   │
//! │  │  Purpose:                                                       │   │
//! │  │  • Wrapping conversation keys for this user (OAEP-SHA256)       │   │
//! │  │  • Never used for message content                               │   │
//! │  │                                                                  │   │
//! │  │  Format:                                                        │   │
//! │  │  • Public key: SPKI DER, shared as standard base64              │   │
//! │  │  • Private key: PKCS#8 DER, only ever stored vault-wrapped      │   │
//! │  │                                                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  OAEP payload ceiling: k - 2·hLen - 2 = 256 - 64 - 2 = 190 bytes       │
//! │  A 32-byte conversation key fits with room to spare.                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::kdf::fingerprint;
use crate::error::{Error, Result};

/// RSA modulus size in bits
pub const RSA_KEY_BITS: usize = 2048;

/// SHA-256 output length, the OAEP hash
const OAEP_HASH_LEN: usize = 32;

/// A user's identity key pair
///
/// ## Security
///
/// - The private half is zeroized when dropped (`RsaPrivateKey` does it)
/// - The private half leaves this process only vault-wrapped
pub struct IdentityKeyPair {
    public: IdentityPublicKey,
    private: IdentityPrivateKey,
}

impl IdentityKeyPair {
    /// Generate a new random key pair from the OS CSPRNG
    pub fn generate() -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| Error::KeyGenerationFailed(format!("RSA key generation failed: {}", e)))?;
        Ok(Self::from_private(IdentityPrivateKey(private)))
    }

    /// Rebuild the pair from its private half
    pub fn from_private(private: IdentityPrivateKey) -> Self {
        let public = private.public_key();
        Self { public, private }
    }

    /// Get the public key
    pub fn public(&self) -> &IdentityPublicKey {
        &self.public
    }

    /// Get the private key
    pub fn private(&self) -> &IdentityPrivateKey {
        &self.private
    }
}

/// RSA public key, exchanged as base64 SPKI DER
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityPublicKey(RsaPublicKey);

impl IdentityPublicKey {
    /// Encode as SPKI DER
    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        let doc = self
            .0
            .to_public_key_der()
            .map_err(|e| Error::Serialization(format!("SPKI encoding failed: {}", e)))?;
        Ok(doc.as_bytes().to_vec())
    }

    /// Parse SPKI DER
    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        let key = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| Error::InvalidKey(format!("not an RSA SPKI public key: {}", e)))?;

        if key.size() * 8 < RSA_KEY_BITS {
            return Err(Error::InvalidKey(format!(
                "RSA modulus is {} bits, need at least {}",
                key.size() * 8,
                RSA_KEY_BITS
            )));
        }
        Ok(Self(key))
    }

    /// Encode as standard base64 of the SPKI DER
    pub fn to_base64(&self) -> Result<String> {
        Ok(BASE64.encode(self.to_spki_der()?))
    }

    /// Parse standard base64 of SPKI DER
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let der = BASE64.decode(encoded.trim())?;
        Self::from_spki_der(&der)
    }

    /// Largest payload this key can wrap with OAEP-SHA256
    pub fn max_payload_len(&self) -> usize {
        self.0.size().saturating_sub(2 * OAEP_HASH_LEN + 2)
    }

    /// Short fingerprint of the SPKI encoding, for logs
    pub fn fingerprint(&self) -> String {
        match self.to_spki_der() {
            Ok(der) => fingerprint(&der),
            Err(_) => "unencodable".to_string(),
        }
    }
}

impl std::fmt::Debug for IdentityPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IdentityPublicKey({})", self.fingerprint())
    }
}

/// RSA private key
pub struct IdentityPrivateKey(RsaPrivateKey);

impl IdentityPrivateKey {
    /// Encode as PKCS#8 DER
    ///
    /// The buffer is zeroized on drop. Only hand it to the vault.
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let doc = self
            .0
            .to_pkcs8_der()
            .map_err(|e| Error::Serialization(format!("PKCS#8 encoding failed: {}", e)))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    /// Parse PKCS#8 DER
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|_| Error::InvalidKey("not an RSA PKCS#8 private key".into()))?;
        Ok(Self(key))
    }

    /// Derive the matching public key
    pub fn public_key(&self) -> IdentityPublicKey {
        IdentityPublicKey(self.0.to_public_key())
    }
}

impl std::fmt::Debug for IdentityPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IdentityPrivateKey([REDACTED])")
    }
}

/// Wrap a short secret for the holder of `public`
///
/// RSA-OAEP with SHA-256 for both the hash and MGF1. Payloads longer than
/// [`IdentityPublicKey::max_payload_len`] are rejected with `Validation`.
pub fn wrap_small_payload(public: &IdentityPublicKey, payload: &[u8]) -> Result<Vec<u8>> {
    let max = public.max_payload_len();
    if payload.len() > max {
        return Err(Error::Validation(format!(
            "payload is {} bytes, RSA-OAEP limit is {}",
            payload.len(),
            max
        )));
    }

    public
        .0
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), payload)
        .map_err(|e| Error::EncryptionFailed(format!("RSA-OAEP wrap failed: {}", e)))
}

/// Unwrap a payload produced by [`wrap_small_payload`]
///
/// Any failure, whether a foreign key or a damaged ciphertext, is reported
/// as `KeyMismatch`.
pub fn unwrap_small_payload(
    private: &IdentityPrivateKey,
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    private
        .0
        .decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| Error::KeyMismatch)
}

// ============================================================================
// TESTS
// ============================================================================
