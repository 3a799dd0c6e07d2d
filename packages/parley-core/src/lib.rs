//! # Parley Core
//!
//! Hybrid end-to-end encryption for multi-user text conversations. The
//! relay and the storage tier carry only ciphertext; any participant of a
//! conversation, and only they, can read it.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          PARLEY CORE                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Session                                                        │   │
//! │  │  login → create/open conversations → encrypt/decrypt → logout   │   │
//! │  └───────────────┬──────────────────────────────┬──────────────────┘   │
//! │                  │                              │                       │
//! │  ┌───────────────▼──────────────┐  ┌────────────▼─────────────────┐    │
//! │  │  Identity                    │  │  Messaging                   │    │
//! │  │  register / login            │  │  conversation keys, codec    │    │
//! │  │  private key vault           │  │  wire records                │    │
//! │  └───────────────┬──────────────┘  └────────────┬─────────────────┘    │
//! │                  │                              │                       │
//! │  ┌───────────────▼──────────────────────────────▼─────────────────┐    │
//! │  │  Crypto                                                         │    │
//! │  │  PBKDF2-HMAC-SHA256 · RSA-2048 OAEP-SHA256 · AES-256-GCM        │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  Collaborators: storage::KeyStore, transport::{Account,Conversation}   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Key derivation, identity keys, AES-GCM primitives
//! - [`identity`] - Registration, login, and the private key vault
//! - [`messaging`] - Conversation keys, message codec, wire records
//! - [`session`] - Login session and its conversation key cache
//! - [`storage`] - Local secure storage of key records
//! - [`transport`] - Account and conversation service boundaries
//!
//! ## Security Model
//!
//! | Secret | Where it lives |
//! |--------|----------------|
//! | Password | Caller only; used once per register/login |
//! | Wrapping key | Memory, for the duration of register/login |
//! | Identity private key | Memory while logged in; vault-wrapped everywhere else |
//! | Conversation key | Session cache; RSA-wrapped per participant on the server |
//! | Message text | Never leaves the client unencrypted |
//!
//! Out of scope: forward secrecy, multi-device sync, key rotation, and
//! detecting a server that substitutes public keys.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod crypto;
pub mod error;
pub mod identity;
pub mod messaging;
pub mod session;
pub mod storage;
pub mod time;
pub mod transport;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use crypto::{IdentityKeyPair, IdentityPublicKey, Salt};
pub use error::{Error, ErrorKind, Result};
pub use identity::{Identity, LoginResponse, RegistrationRequest, StoredKeys};
pub use messaging::{ConversationKey, ConversationRecord, Message};
pub use session::{Session, SessionKeyCache};
pub use storage::{KeyStore, SecureStore};
pub use transport::{AccountService, ConversationService, InMemoryDirectory};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Runtime configuration for a [`Session`]
///
/// Cryptographic parameters are constants in [`crypto`], not settings:
/// changing them would make existing vaults and conversations unreadable.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Largest plaintext a session will encrypt, in bytes
    pub max_message_size: usize,
    /// Enable verbose logging
    pub verbose_logging: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_message_size: messaging::MAX_MESSAGE_SIZE,
            verbose_logging: false,
        }
    }
}

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Parley Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns build information for debugging
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        target: std::env::consts::OS,
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
        pbkdf2_iterations: crypto::PBKDF2_ITERATIONS,
        rsa_key_bits: crypto::RSA_KEY_BITS,
    }
}

/// Build information for debugging
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Crate version
    pub version: &'static str,
    /// Target operating system
    pub target: &'static str,
    /// Build profile (debug/release)
    pub profile: &'static str,
    /// PBKDF2 rounds used for wrapping keys
    pub pbkdf2_iterations: u32,
    /// Identity key modulus size
    pub rsa_key_bits: usize,
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// Shared RSA key pairs; generating 2048-bit keys per test is too slow
#[cfg(test)]
pub(crate) mod test_support {
    use once_cell::sync::Lazy;

    use crate::crypto::IdentityKeyPair;

    fn generate() -> IdentityKeyPair {
        IdentityKeyPair::generate().expect("RSA key generation")
    }

    static ALICE: Lazy<IdentityKeyPair> = Lazy::new(generate);
    static BOB: Lazy<IdentityKeyPair> = Lazy::new(generate);
    static CAROL: Lazy<IdentityKeyPair> = Lazy::new(generate);

    pub(crate) fn alice() -> &'static IdentityKeyPair {
        &ALICE
    }

    pub(crate) fn bob() -> &'static IdentityKeyPair {
        &BOB
    }

    pub(crate) fn carol() -> &'static IdentityKeyPair {
        &CAROL
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_build_info() {
        let info = build_info();
        assert_eq!(info.version, version());
        assert_eq!(info.pbkdf2_iterations, 100_000);
        assert_eq!(info.rsa_key_bits, 2048);
    }

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert_eq!(config.max_message_size, 64 * 1024);
        assert!(!config.verbose_logging);
    }
}
