//! # Cryptography Module
//!
//! All cryptographic primitives used by Parley Core.
//!
//! ## Security Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    KEY HIERARCHY                                │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  Password + Salt                                                │   │
//! │  │        │  PBKDF2-HMAC-SHA256, 100 000 rounds                    │   │
//! │  │        ▼                                                        │   │
//! │  │  Wrapping Key (AES-256) ──wraps──► Identity Private Key (RSA)   │   │
//! │  │                                           │                     │   │
//! │  │                                           │ RSA-OAEP unwrap     │   │
//! │  │                                           ▼                     │   │
//! │  │                          Conversation Key (AES-256, per conv)   │   │
//! │  │                                           │                     │   │
//! │  │                                           ▼                     │   │
//! │  │                                  Message Content (AES-GCM)      │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose |
//! |-----------|---------|
//! | PBKDF2-HMAC-SHA256 | Password → wrapping key |
//! | RSA-2048 OAEP-SHA256 | Conversation key distribution |
//! | AES-256-GCM | Private key at rest, message content |
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: Symmetric keys and private keys are zeroized when dropped
//! 2. **Secure Random**: `rand::rngs::OsRng` for salts, IVs, keys
//! 3. **No Nonce Reuse**: Every encryption draws a fresh 96-bit IV

mod encryption;
mod kdf;
mod keys;

pub use encryption::{
    decrypt, encrypt, open, seal, EncryptionKey, Nonce, KEY_SIZE, NONCE_SIZE, TAG_SIZE,
};
pub use kdf::{derive_wrapping_key, fingerprint, Salt, WrappingKey, PBKDF2_ITERATIONS, SALT_SIZE};
pub use keys::{
    unwrap_small_payload, wrap_small_payload, IdentityKeyPair, IdentityPrivateKey,
    IdentityPublicKey, RSA_KEY_BITS,
};
