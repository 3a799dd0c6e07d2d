//! # Identity Module
//!
//! Registration and login: the flows that create a user's identity key pair
//! and later bring it back into memory from a password.
//!
//! ## Identity Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         IDENTITY LIFECYCLE                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  REGISTER                                                              │
//! │  ────────                                                               │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  1. IdentityKeyPair::generate()         (RSA-2048)          │       │
//! │  │  2. Salt::generate()                    (16 random bytes)   │       │
//! │  │  3. derive_wrapping_key(password, salt) (PBKDF2, 100k)      │       │
//! │  │  4. vault::wrap(private, wrapping_key)  (AES-256-GCM)       │       │
//! │  │                                                             │       │
//! │  │  Output: RegistrationRequest {                              │       │
//! │  │    username, password, publicKey,                           │       │
//! │  │    encryptedPrivateKey, saltBase64                          │       │
//! │  │  }                                                          │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  LOGIN                                                                 │
//! │  ─────                                                                  │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  StoredKeys { publicKey, encryptedPrivateKey, saltBase64 }  │       │
//! │  │        │                                                    │       │
//! │  │        ├──► Salt::from_base64 ──► derive_wrapping_key       │       │
//! │  │        │                                │                   │       │
//! │  │        └──► vault::unwrap ◄─────────────┘                   │       │
//! │  │                  │                                          │       │
//! │  │                  ▼                                          │       │
//! │  │  private.public_key() == publicKey ?  ── no ──► Auth error  │       │
//! │  │                  │ yes                                      │       │
//! │  │                  ▼                                          │       │
//! │  │             Identity (in memory only)                       │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed login constructs nothing: every intermediate secret lives in a
//! zeroizing buffer and is dropped on the error path.

pub mod vault;

pub use vault::WrappedPrivateKey;

use serde::{Deserialize, Serialize};

use crate::crypto::{
    derive_wrapping_key, IdentityKeyPair, IdentityPrivateKey, IdentityPublicKey, Salt,
};
use crate::error::{Error, Result};

/// Local secure storage record for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredKeys {
    /// Base64 SPKI public key
    pub public_key: String,
    /// Vault-wrapped private key
    pub encrypted_private_key: WrappedPrivateKey,
    /// Base64 PBKDF2 salt
    pub salt_base64: String,
}

/// Body sent to the account service on registration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    /// Account name
    pub username: String,
    /// Account password, for server-side authentication
    pub password: String,
    /// Base64 SPKI public key
    pub public_key: String,
    /// Vault-wrapped private key
    pub encrypted_private_key: WrappedPrivateKey,
    /// Base64 PBKDF2 salt
    pub salt_base64: String,
}

impl RegistrationRequest {
    /// The key material portion of the request
    pub fn stored_keys(&self) -> StoredKeys {
        StoredKeys {
            public_key: self.public_key.clone(),
            encrypted_private_key: self.encrypted_private_key.clone(),
            salt_base64: self.salt_base64.clone(),
        }
    }
}

impl std::fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("public_key", &self.public_key)
            .field("encrypted_private_key", &self.encrypted_private_key)
            .field("salt_base64", &self.salt_base64)
            .finish()
    }
}

/// Account service reply to a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Session token for the transport layer
    pub token: String,
    /// The user's key record
    pub keys: LoginKeys,
}

/// Key record inside a [`LoginResponse`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginKeys {
    /// Base64 SPKI public key
    pub public: String,
    /// Vault-wrapped private key
    pub encrypted_private: WrappedPrivateKey,
    /// Base64 PBKDF2 salt
    pub salt_base64: String,
}

impl From<LoginKeys> for StoredKeys {
    fn from(keys: LoginKeys) -> Self {
        Self {
            public_key: keys.public,
            encrypted_private_key: keys.encrypted_private,
            salt_base64: keys.salt_base64,
        }
    }
}

/// An unlocked user identity
///
/// ## Security
///
/// - Holds the private key in memory; dropping the identity zeroizes it
/// - Never serialized; use [`Identity::stored_keys`] for persistence
pub struct Identity {
    username: String,
    keypair: IdentityKeyPair,
    stored: StoredKeys,
    created_at: i64,
}

impl Identity {
    /// Create a new identity for `username`, protected by `password`
    ///
    /// ## Returns
    ///
    /// Tuple of (Identity, RegistrationRequest). The request goes to the
    /// account service; its key portion also goes to local secure storage.
    pub fn register(username: &str, password: &str) -> Result<(Self, RegistrationRequest)> {
        validate_credentials(username, password)?;

        let keypair = IdentityKeyPair::generate()?;
        let salt = Salt::generate();
        let wrapping_key = derive_wrapping_key(password, &salt)?;
        let wrapped = vault::wrap(keypair.private(), &wrapping_key)?;

        let stored = StoredKeys {
            public_key: keypair.public().to_base64()?,
            encrypted_private_key: wrapped,
            salt_base64: salt.to_base64(),
        };

        let request = RegistrationRequest {
            username: username.to_string(),
            password: password.to_string(),
            public_key: stored.public_key.clone(),
            encrypted_private_key: stored.encrypted_private_key.clone(),
            salt_base64: stored.salt_base64.clone(),
        };

        tracing::info!(
            "Registered identity for {} (key {})",
            username,
            keypair.public().fingerprint()
        );

        Ok((
            Self {
                username: username.to_string(),
                keypair,
                stored,
                created_at: crate::time::now_timestamp(),
            },
            request,
        ))
    }

    /// Unlock an existing identity from its stored key record
    ///
    /// ## Errors
    ///
    /// - `Validation`: empty credentials or a malformed record
    /// - `Authentication`: wrong password, tampered record, or a private key
    ///   that does not belong to the stored public key
    pub fn login(username: &str, password: &str, keys: &StoredKeys) -> Result<Self> {
        validate_credentials(username, password)?;

        let salt = Salt::from_base64(&keys.salt_base64)?;
        let expected_public = IdentityPublicKey::from_base64(&keys.public_key)?;
        let wrapping_key = derive_wrapping_key(password, &salt)?;

        let private = vault::unwrap(&keys.encrypted_private_key, &wrapping_key).map_err(|e| {
            tracing::warn!("Login failed for {}: {}", username, e);
            e
        })?;

        if private.public_key() != expected_public {
            tracing::warn!("Login failed for {}: private key does not match public key", username);
            return Err(Error::Authentication);
        }

        let keypair = IdentityKeyPair::from_private(private);
        tracing::info!(
            "Unlocked identity for {} (key {})",
            username,
            keypair.public().fingerprint()
        );

        Ok(Self {
            username: username.to_string(),
            keypair,
            stored: keys.clone(),
            created_at: crate::time::now_timestamp(),
        })
    }

    /// Unlock an identity from an account service login reply
    pub fn from_login_response(
        username: &str,
        password: &str,
        response: &LoginResponse,
    ) -> Result<Self> {
        let keys: StoredKeys = response.keys.clone().into();
        Self::login(username, password, &keys)
    }

    /// Get the username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the public key
    pub fn public_key(&self) -> &IdentityPublicKey {
        self.keypair.public()
    }

    /// Get the private key
    pub fn private_key(&self) -> &IdentityPrivateKey {
        self.keypair.private()
    }

    /// Get the record to persist in local secure storage
    pub fn stored_keys(&self) -> &StoredKeys {
        &self.stored
    }

    /// When this identity was unlocked or created (Unix timestamp)
    pub fn created_at(&self) -> i64 {
        self.created_at
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("public_key", self.keypair.public())
            .finish_non_exhaustive()
    }
}

fn validate_credentials(username: &str, password: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(Error::Validation("username must not be empty".into()));
    }
    if password.is_empty() {
        return Err(Error::Validation("password must not be empty".into()));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_wrapping_key, Salt};
    use crate::test_support::{alice, bob};

    /// Build a stored record for a fixture key without generating a new RSA key
    fn stored_for(pair: &IdentityKeyPair, password: &str) -> StoredKeys {
        let salt = Salt::generate();
        let key = derive_wrapping_key(password, &salt).unwrap();
        StoredKeys {
            public_key: pair.public().to_base64().unwrap(),
            encrypted_private_key: vault::wrap(pair.private(), &key).unwrap(),
            salt_base64: salt.to_base64(),
        }
    }

    #[test]
    fn test_register_then_login() {
        let (identity, request) = Identity::register("alice", "correct horse").unwrap();

        assert_eq!(request.username, "alice");
        assert_eq!(request.stored_keys(), *identity.stored_keys());

        let restored = Identity::login("alice", "correct horse", identity.stored_keys()).unwrap();
        assert_eq!(restored.public_key(), identity.public_key());
        assert_eq!(restored.username(), "alice");
    }

    #[test]
    fn test_login_wrong_password() {
        let keys = stored_for(alice(), "correct horse");
        let result = Identity::login("alice", "wrong", &keys);

        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn test_login_rejects_swapped_public_key() {
        let mut keys = stored_for(alice(), "pw");
        keys.public_key = bob().public().to_base64().unwrap();

        let result = Identity::login("alice", "pw", &keys);
        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let keys = stored_for(alice(), "pw");

        assert!(matches!(Identity::login("", "pw", &keys), Err(Error::Validation(_))));
        assert!(matches!(Identity::login("alice", "", &keys), Err(Error::Validation(_))));
        assert!(matches!(Identity::register("alice", ""), Err(Error::Validation(_))));
    }

    #[test]
    fn test_malformed_salt_rejected() {
        let mut keys = stored_for(alice(), "pw");
        keys.salt_base64 = "AAAA".into();

        assert!(matches!(Identity::login("alice", "pw", &keys), Err(Error::Validation(_))));
    }

    #[test]
    fn test_login_response_wire_format() {
        let json = r#"{
            "token": "t-1",
            "keys": { "public": "PUB", "encryptedPrivate": "ENC", "saltBase64": "SALT" }
        }"#;
        let response: LoginResponse = serde_json::from_str(json).unwrap();
        let keys: StoredKeys = response.keys.into();

        assert_eq!(keys.public_key, "PUB");
        assert_eq!(keys.encrypted_private_key.as_str(), "ENC");
        assert_eq!(keys.salt_base64, "SALT");
    }

    #[test]
    fn test_from_login_response() {
        let keys = stored_for(bob(), "hunter2");
        let response = LoginResponse {
            token: "t".into(),
            keys: LoginKeys {
                public: keys.public_key.clone(),
                encrypted_private: keys.encrypted_private_key.clone(),
                salt_base64: keys.salt_base64.clone(),
            },
        };

        let identity = Identity::from_login_response("bob", "hunter2", &response).unwrap();
        assert_eq!(identity.public_key(), bob().public());
    }

    #[test]
    fn test_registration_request_wire_format() {
        let request = RegistrationRequest {
            username: "alice".into(),
            password: "pw".into(),
            public_key: "PUB".into(),
            encrypted_private_key: WrappedPrivateKey::new("ENC"),
            salt_base64: "SALT".into(),
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["publicKey"], "PUB");
        assert_eq!(value["encryptedPrivateKey"], "ENC");
        assert_eq!(value["saltBase64"], "SALT");
        assert!(!format!("{:?}", request).contains("\"pw\""));
    }
}
