//! # Error Handling
//!
//! Error types for Parley Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                      │
//! │  │                                                                      │
//! │  ├── Validation Errors                                                  │
//! │  │   ├── Validation            - Malformed input (length, encoding)     │
//! │  │   ├── InvalidKey            - Unparseable key material               │
//! │  │   └── InvalidMessageContent - Plaintext rejected by the codec        │
//! │  │                                                                      │
//! │  ├── Authentication            - AES-GCM tag did not verify             │
//! │  ├── KeyMismatch               - RSA-OAEP unwrap with the wrong key     │
//! │  ├── PartialDistribution       - Some participants could not be served  │
//! │  │                                                                      │
//! │  ├── Session Errors                                                     │
//! │  │   ├── NoSession             - No unlocked identity                   │
//! │  │   └── ConversationNotFound  - No key for this conversation           │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                     │
//! │  │   ├── StorageRead           - Local secure storage read failed       │
//! │  │   └── StorageWrite          - Local secure storage write failed      │
//! │  │                                                                      │
//! │  ├── Transport                 - Collaborator call failed               │
//! │  │                                                                      │
//! │  └── Internal Errors                                                    │
//! │      ├── EncryptionFailed      - Cipher refused to run                  │
//! │      ├── KeyDerivationFailed   - PBKDF2 refused its parameters          │
//! │      ├── KeyGenerationFailed   - RSA key generation failed              │
//! │      └── Serialization         - JSON encoding/decoding failed          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## What users see
//!
//! `Display` carries internal diagnostics and goes to logs. Anything shown
//! to an end user goes through [`Error::user_message`], which collapses
//! `Authentication` and `KeyMismatch` into the same generic text so a wrong
//! password cannot be told apart from a corrupted record.

use thiserror::Error;

use crate::messaging::{Distribution, DistributionFailure};

/// Result type alias for Parley Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Parley Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Validation Errors (100-199)
    // ========================================================================
    /// Malformed input: wrong length, bad base64, empty credentials
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Key material that could not be parsed
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Message content rejected by the codec
    #[error("Invalid message content: {0}")]
    InvalidMessageContent(String),

    // ========================================================================
    // Authentication (200)
    // ========================================================================
    /// Symmetric decryption failed its integrity check
    #[error("Authentication failed: wrong key or tampered ciphertext")]
    Authentication,

    // ========================================================================
    // Key Mismatch (300)
    // ========================================================================
    /// Asymmetric unwrap failed
    #[error("Key mismatch: payload was not wrapped for this private key")]
    KeyMismatch,

    // ========================================================================
    // Distribution (400)
    // ========================================================================
    /// Key distribution reached only some participants
    #[error("Key distribution incomplete: {} participant(s) failed", .failed.len())]
    PartialDistribution {
        /// Participants that could not receive a wrapped key
        failed: Vec<DistributionFailure>,
        /// Entries that were wrapped successfully
        distributed: Distribution,
    },

    // ========================================================================
    // Session Errors (500-599)
    // ========================================================================
    /// No identity is unlocked
    #[error("No active session. Log in first.")]
    NoSession,

    /// No conversation key is available for this conversation
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    // ========================================================================
    // Storage Errors (600-699)
    // ========================================================================
    /// Failed to read from local secure storage
    #[error("Failed to read from storage: {0}")]
    StorageRead(String),

    /// Failed to write to local secure storage
    #[error("Failed to write to storage: {0}")]
    StorageWrite(String),

    // ========================================================================
    // Transport Errors (700)
    // ========================================================================
    /// A remote collaborator call failed
    #[error("Transport error: {0}")]
    Transport(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Key derivation failed
    #[error("Failed to derive key: {0}")]
    KeyDerivationFailed(String),

    /// Key generation failed
    #[error("Failed to generate key: {0}")]
    KeyGenerationFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse error category, stable across variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input
    Validation,
    /// Symmetric integrity failure
    Authentication,
    /// Asymmetric unwrap failure
    KeyMismatch,
    /// Some participants were not served
    PartialDistribution,
    /// Session state problem
    Session,
    /// Local storage problem
    Storage,
    /// Remote collaborator problem
    Transport,
    /// Should not happen in normal operation
    Internal,
}

/// Generic text shown for any credential or key failure
pub const INVALID_CREDENTIALS: &str = "invalid credentials";

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Validation
    /// - 200: Authentication
    /// - 300: Key mismatch
    /// - 400: Partial distribution
    /// - 500-599: Session
    /// - 600-699: Storage
    /// - 700: Transport
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            Error::Validation(_) => 100,
            Error::InvalidKey(_) => 101,
            Error::InvalidMessageContent(_) => 102,

            Error::Authentication => 200,
            Error::KeyMismatch => 300,
            Error::PartialDistribution { .. } => 400,

            Error::NoSession => 500,
            Error::ConversationNotFound(_) => 501,

            Error::StorageRead(_) => 600,
            Error::StorageWrite(_) => 601,

            Error::Transport(_) => 700,

            Error::EncryptionFailed(_) => 900,
            Error::KeyDerivationFailed(_) => 901,
            Error::KeyGenerationFailed(_) => 902,
            Error::Serialization(_) => 903,
        }
    }

    /// Get the error category
    pub fn kind(&self) -> ErrorKind {
        match self.code() {
            100..=199 => ErrorKind::Validation,
            200 => ErrorKind::Authentication,
            300 => ErrorKind::KeyMismatch,
            400 => ErrorKind::PartialDistribution,
            500..=599 => ErrorKind::Session,
            600..=699 => ErrorKind::Storage,
            700 => ErrorKind::Transport,
            _ => ErrorKind::Internal,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Cryptographic failures never are. Only transport failures may be
    /// retried, and retrying is the collaborator's job.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Text that is safe to show to an end user
    pub fn user_message(&self) -> String {
        match self {
            Error::Authentication | Error::KeyMismatch => INVALID_CREDENTIALS.to_string(),
            Error::Validation(_) | Error::InvalidKey(_) | Error::InvalidMessageContent(_) => {
                "the request was malformed".to_string()
            }
            Error::PartialDistribution { failed, .. } => {
                let names: Vec<&str> = failed.iter().map(|f| f.participant_id.as_str()).collect();
                format!("could not share the conversation with: {}", names.join(", "))
            }
            Error::NoSession => "you are not logged in".to_string(),
            Error::ConversationNotFound(_) => "conversation is not available".to_string(),
            Error::Transport(_) => "the service is unreachable, try again".to_string(),
            Error::StorageRead(_) | Error::StorageWrite(_) => {
                "local key storage is unavailable".to_string()
            }
            _ => "something went wrong".to_string(),
        }
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Validation(format!("invalid base64: {}", err))
    }
}

// ============================================================================
// TESTS
// ============================================================================
