//! # Secure Storage
//!
//! Local storage for each user's key record.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SECURE STORAGE                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyStore Trait                                                 │   │
//! │  │  ──────────────                                                  │   │
//! │  │                                                                 │   │
//! │  │  • get(username)          - StoredKeys for this user, if any   │   │
//! │  │  • put(username, keys)    - Replace the record                 │   │
//! │  │  • delete(username)       - Forget the record                  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  SecureStore (in memory)                                               │
//! │  ────────────────────────                                               │
//! │  "parley.keys.<username>" → JSON(StoredKeys)                            │
//! │  optionally sealed with an at-rest AES-256-GCM key, using the entry    │
//! │  name as associated data so values cannot be swapped between entries. │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The record is already safe to store in the clear: the private key inside
//! it is vault-wrapped. The at-rest key is an extra layer for hosts that
//! have one.

use parking_lot::RwLock;
use std::collections::HashMap;
use zeroize::Zeroizing;

use crate::crypto::{decrypt, encrypt, EncryptionKey, Nonce, NONCE_SIZE};
use crate::error::{Error, Result};
use crate::identity::StoredKeys;

/// Key names for secure storage
pub mod keys {
    /// Prefix of per-user key records
    pub const USER_KEYS_PREFIX: &str = "parley.keys.";

    /// Entry name for one user's key record
    pub fn user_keys(username: &str) -> String {
        format!("{}{}", USER_KEYS_PREFIX, username)
    }
}

/// Local secure storage of key records, one per user
pub trait KeyStore: Send + Sync {
    /// Load the record for `username`
    fn get(&self, username: &str) -> Result<Option<StoredKeys>>;

    /// Store or replace the record for `username`
    fn put(&self, username: &str, keys: &StoredKeys) -> Result<()>;

    /// Remove the record for `username`; returns whether one existed
    fn delete(&self, username: &str) -> Result<bool>;
}

/// In-memory secure store
pub struct SecureStore {
    memory: RwLock<HashMap<String, Vec<u8>>>,
    /// Optional encryption key for data at rest
    encryption_key: Option<EncryptionKey>,
}

impl SecureStore {
    /// Create a new secure store
    pub fn new() -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            encryption_key: None,
        }
    }

    /// Create a secure store that seals every value with `key`
    pub fn with_encryption(key: [u8; 32]) -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            encryption_key: Some(EncryptionKey::from_bytes(key)),
        }
    }

    /// Store bytes under `name`
    pub fn store(&self, name: &str, value: &[u8]) -> Result<()> {
        let data = match self.encryption_key {
            Some(ref enc_key) => {
                let (nonce, ciphertext) = encrypt(enc_key, value, name.as_bytes())
                    .map_err(|e| Error::StorageWrite(e.to_string()))?;
                let mut sealed = nonce.as_bytes().to_vec();
                sealed.extend_from_slice(&ciphertext);
                sealed
            }
            None => value.to_vec(),
        };

        self.memory.write().insert(name.to_string(), data);
        Ok(())
    }

    /// Retrieve bytes stored under `name`
    pub fn retrieve(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let data = match self.memory.read().get(name).cloned() {
            Some(d) => d,
            None => return Ok(None),
        };

        let Some(ref enc_key) = self.encryption_key else {
            return Ok(Some(Zeroizing::new(data)));
        };

        if data.len() < NONCE_SIZE {
            return Err(Error::StorageRead("stored data too short".into()));
        }
        let (iv, ciphertext) = data.split_at(NONCE_SIZE);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(iv);

        let plaintext = decrypt(enc_key, &Nonce::from_bytes(nonce), ciphertext, name.as_bytes())
            .map_err(|_| Error::StorageRead(format!("integrity check failed for {}", name)))?;
        Ok(Some(Zeroizing::new(plaintext)))
    }

    /// Delete `name`; returns whether it existed
    pub fn remove(&self, name: &str) -> bool {
        self.memory.write().remove(name).is_some()
    }

    /// Check if `name` exists
    pub fn exists(&self, name: &str) -> bool {
        self.memory.read().contains_key(name)
    }

    #[cfg(test)]
    fn raw(&self, name: &str) -> Option<Vec<u8>> {
        self.memory.read().get(name).cloned()
    }
}

impl Default for SecureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for SecureStore {
    fn get(&self, username: &str) -> Result<Option<StoredKeys>> {
        match self.retrieve(&keys::user_keys(username))? {
            Some(bytes) => {
                let record = serde_json::from_slice(&bytes)
                    .map_err(|e| Error::StorageRead(format!("corrupt key record: {}", e)))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn put(&self, username: &str, record: &StoredKeys) -> Result<()> {
        let json = Zeroizing::new(serde_json::to_vec(record)?);
        self.store(&keys::user_keys(username), &json)?;
        tracing::debug!("Stored key record for {}", username);
        Ok(())
    }

    fn delete(&self, username: &str) -> Result<bool> {
        Ok(self.remove(&keys::user_keys(username)))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::WrappedPrivateKey;

    fn record() -> StoredKeys {
        StoredKeys {
            public_key: "PUB".into(),
            encrypted_private_key: WrappedPrivateKey::new("WRAPPED"),
            salt_base64: "SALT".into(),
        }
    }

    #[test]
    fn test_store_retrieve_delete() {
        let store = SecureStore::new();

        store.store("entry", b"secret data").unwrap();
        assert!(store.exists("entry"));
        assert_eq!(store.retrieve("entry").unwrap().unwrap().as_slice(), b"secret data");

        assert!(store.remove("entry"));
        assert!(!store.exists("entry"));
        assert!(store.retrieve("entry").unwrap().is_none());
    }

    #[test]
    fn test_encrypted_store_hides_plaintext() {
        let store = SecureStore::with_encryption([42u8; 32]);
        store.store("entry", b"secret data").unwrap();

        let raw = store.raw("entry").unwrap();
        assert!(!raw.windows(6).any(|w| w == b"secret"));
        assert_eq!(store.retrieve("entry").unwrap().unwrap().as_slice(), b"secret data");
    }

    #[test]
    fn test_encrypted_entries_cannot_be_swapped() {
        let store = SecureStore::with_encryption([42u8; 32]);
        store.store("a", b"value a").unwrap();

        let sealed = store.raw("a").unwrap();
        store.memory.write().insert("b".to_string(), sealed);

        assert!(matches!(store.retrieve("b"), Err(Error::StorageRead(_))));
    }

    #[test]
    fn test_key_store_round_trip() {
        let store = SecureStore::with_encryption([7u8; 32]);

        assert!(store.get("alice").unwrap().is_none());
        store.put("alice", &record()).unwrap();

        assert_eq!(store.get("alice").unwrap(), Some(record()));
        assert!(store.exists(&keys::user_keys("alice")));

        assert!(KeyStore::delete(&store, "alice").unwrap());
        assert!(!KeyStore::delete(&store, "alice").unwrap());
    }

    #[test]
    fn test_corrupt_record_is_storage_error() {
        let store = SecureStore::new();
        store.store(&keys::user_keys("bob"), b"not json").unwrap();

        assert!(matches!(store.get("bob"), Err(Error::StorageRead(_))));
    }
}
