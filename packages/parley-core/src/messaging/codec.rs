//! Message content codec.
//!
//! Message text travels as `base64(iv ‖ ciphertext ‖ tag)` under the
//! conversation key. The relay and the store only ever see this string.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use super::keys::ConversationKey;
use crate::crypto::{open, seal};
use crate::error::{Error, Result};

/// Maximum plaintext size (64KB)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Encrypt message text
///
/// Every call uses a fresh IV, so encrypting the same text twice gives
/// different output. Empty text still produces a real ciphertext.
pub fn encrypt(plaintext: &str, key: &ConversationKey) -> Result<String> {
    if plaintext.len() > MAX_MESSAGE_SIZE {
        return Err(Error::InvalidMessageContent(format!(
            "message is {} bytes, maximum is {}",
            plaintext.len(),
            MAX_MESSAGE_SIZE
        )));
    }

    let sealed = seal(key.encryption_key(), plaintext.as_bytes())?;
    Ok(BASE64.encode(sealed))
}

/// Decrypt message text
///
/// An empty input decrypts to an empty string without touching the cipher.
///
/// ## Errors
///
/// - `Validation`: not base64, shorter than IV plus tag, or not UTF-8
/// - `Authentication`: wrong key or tampered content
pub fn decrypt(encoded: &str, key: &ConversationKey) -> Result<String> {
    if encoded.is_empty() {
        return Ok(String::new());
    }

    let sealed = BASE64.decode(encoded)?;
    let plaintext = open(key.encryption_key(), &sealed)?;

    String::from_utf8(plaintext.to_vec())
        .map_err(|_| Error::Validation("decrypted message is not valid UTF-8".into()))
}
