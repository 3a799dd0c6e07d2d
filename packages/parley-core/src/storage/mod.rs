//! # Storage Module
//!
//! Local secure storage for users' key records.
//!
//! Only the [`StoredKeys`](crate::identity::StoredKeys) record is kept
//! locally: public key, vault-wrapped private key, salt. Conversation keys
//! are never persisted; they live in the session cache until logout.

mod secure_store;

pub use secure_store::{keys, KeyStore, SecureStore};
