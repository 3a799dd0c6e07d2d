//! # Encryption Module
//!
//! AES-256-GCM primitives shared by the private key vault and the message
//! codec.
//!
//! ## Sealed Format
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SEALED BYTE LAYOUT                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   0            12                                  len-16        len    │
//! │   ├────────────┼───────────────────────────────────┼─────────────┤      │
//! │   │  IV (12)   │  ciphertext (same length as input) │  tag (16)   │      │
//! │   └────────────┴───────────────────────────────────┴─────────────┘      │
//! │                                                                         │
//! │   seal(key, plaintext)  → iv ‖ ct ‖ tag      (fresh random IV)         │
//! │   open(key, sealed)     → plaintext          (or Authentication)        │
//! │                                                                         │
//! │   Both the vault and the message codec base64 this layout as a whole,  │
//! │   which is what WebCrypto clients produce for AES-GCM.                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//!
//! | Property | Guarantee |
//! |----------|-----------|
//! | Confidentiality | Only holders of the key can read the payload |
//! | Integrity | Any modification is detected by the 128-bit tag |
//! | Nonce discipline | Every call draws a new IV from the OS CSPRNG |

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// A nonce (number used once) for AES-GCM encryption
///
/// ## Critical Security Requirement
///
/// **NEVER reuse a nonce with the same key!**
///
/// Random 96-bit nonces are safe for up to 2^32 messages per key
/// (birthday bound). Conversation keys are never rotated, so nothing here
/// keeps a counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a cryptographically random nonce
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// An AES-256-GCM encryption key
///
/// Zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generate a random key from the OS CSPRNG
    pub fn random() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let key = Self(bytes);
        bytes.zeroize();
        key
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// Encrypt with AES-256-GCM
///
/// ## Returns
///
/// Tuple of (nonce, ciphertext_with_tag)
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8], aad: &[u8]) -> Result<(Nonce, Vec<u8>)> {
    let nonce = Nonce::random();
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::EncryptionFailed(format!("Invalid key: {}", e)))?;

    let payload = Payload {
        msg: plaintext,
        aad,
    };

    let ciphertext = cipher
        .encrypt(AesNonce::from_slice(&nonce.0), payload)
        .map_err(|e| Error::EncryptionFailed(format!("Encryption failed: {}", e)))?;

    Ok((nonce, ciphertext))
}

/// Decrypt with AES-256-GCM
///
/// ## Errors
///
/// Returns `Authentication` if the ciphertext was tampered with, the AAD
/// doesn't match, or the key or nonce is wrong. The cases are not
/// distinguishable.
pub fn decrypt(
    key: &EncryptionKey,
    nonce: &Nonce,
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::EncryptionFailed(format!("Invalid key: {}", e)))?;

    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    cipher
        .decrypt(AesNonce::from_slice(&nonce.0), payload)
        .map_err(|_| Error::Authentication)
}

/// Encrypt and frame as `iv ‖ ciphertext ‖ tag`
pub fn seal(key: &EncryptionKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let (nonce, ciphertext) = encrypt(key, plaintext, &[])?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(nonce.as_bytes());
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Split an `iv ‖ ciphertext ‖ tag` frame and decrypt it
///
/// Frames shorter than IV plus tag are rejected with `Validation` before
/// the cipher runs.
pub fn open(key: &EncryptionKey, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Validation(format!(
            "sealed payload is {} bytes, need at least {}",
            sealed.len(),
            NONCE_SIZE + TAG_SIZE
        )));
    }

    let (iv, ciphertext) = sealed.split_at(NONCE_SIZE);
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(iv);

    decrypt(key, &Nonce::from_bytes(nonce), ciphertext, &[]).map(Zeroizing::new)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_basic() {
        let key = EncryptionKey::from_bytes([42u8; 32]);
        let plaintext = b"Hello, World!";
        let aad = b"context";

        let (nonce, ciphertext) = encrypt(&key, plaintext, aad).unwrap();
        let decrypted = decrypt(&key, &nonce, &ciphertext, aad).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_aad_fails() {
        let key = EncryptionKey::from_bytes([42u8; 32]);

        let (nonce, ciphertext) = encrypt(&key, b"Hello, World!", b"context").unwrap();
        let result = decrypt(&key, &nonce, &ciphertext, b"wrong context");

        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn test_seal_layout() {
        let key = EncryptionKey::random();
        let sealed = seal(&key, b"abc").unwrap();

        assert_eq!(sealed.len(), NONCE_SIZE + 3 + TAG_SIZE);
        assert_eq!(open(&key, &sealed).unwrap().as_slice(), b"abc");
    }

    #[test]
    fn test_seal_empty_plaintext() {
        let key = EncryptionKey::random();
        let sealed = seal(&key, b"").unwrap();

        assert_eq!(sealed.len(), NONCE_SIZE + TAG_SIZE);
        assert!(open(&key, &sealed).unwrap().is_empty());
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let sealed = seal(&EncryptionKey::from_bytes([1u8; 32]), b"secret").unwrap();
        let result = open(&EncryptionKey::from_bytes([2u8; 32]), &sealed);

        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn test_open_tampered_iv_fails() {
        let key = EncryptionKey::random();
        let mut sealed = seal(&key, b"secret").unwrap();
        sealed[0] ^= 0x01;

        assert!(matches!(open(&key, &sealed), Err(Error::Authentication)));
    }

    #[test]
    fn test_open_short_frame_is_validation() {
        let key = EncryptionKey::random();
        let result = open(&key, &[0u8; NONCE_SIZE + TAG_SIZE - 1]);

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_random_keys_differ() {
        let a = EncryptionKey::random();
        let b = EncryptionKey::random();
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_eq!(format!("{:?}", a), "EncryptionKey([REDACTED])");
    }
}
