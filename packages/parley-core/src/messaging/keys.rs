//! # Conversation Keys
//!
//! Minting, distributing and recovering the per-conversation symmetric key.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CONVERSATION KEY DISTRIBUTION                        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Creator                                                                │
//! │  ┌──────────────────────────────┐                                       │
//! │  │ create_conversation_key()    │  32 random bytes                      │
//! │  └──────────────┬───────────────┘                                       │
//! │                 │ distribute(key, participants)                         │
//! │     ┌───────────┼──────────────────────┐                                │
//! │     ▼           ▼                      ▼                                │
//! │  OAEP(alice)  OAEP(bob)   ...       OAEP(carol)                         │
//! │     │           │                      │                                │
//! │     └───────────┴──────────┬───────────┘                                │
//! │                            ▼                                            │
//! │           Distribution { participant → WrappedKeyEntry }                │
//! │                            │  published only when complete              │
//! │                            ▼                                            │
//! │  Participant: unwrap_own_key(entry, own_private) → same 32 bytes        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Adding someone to an existing conversation means minting a new key and
//! distributing it to the whole new participant set.

use std::collections::{BTreeMap, HashSet};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use crate::crypto::{
    unwrap_small_payload, wrap_small_payload, EncryptionKey, IdentityPrivateKey,
    IdentityPublicKey, KEY_SIZE,
};
use crate::error::{Error, Result};

/// Symmetric content key for one conversation
///
/// Lives only in memory. Zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct ConversationKey(EncryptionKey);

impl ConversationKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(EncryptionKey::from_bytes(bytes))
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.0.as_bytes()
    }

    pub(crate) fn encryption_key(&self) -> &EncryptionKey {
        &self.0
    }
}

impl std::fmt::Debug for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ConversationKey([REDACTED])")
    }
}

/// Mint a fresh random conversation key
pub fn create_conversation_key() -> ConversationKey {
    ConversationKey(EncryptionKey::random())
}

/// A participant and the public key their copy is wrapped for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantKey {
    /// Participant id (username)
    pub participant_id: String,
    /// Base64 SPKI public key; empty when the directory has none
    pub public_key: String,
}

impl ParticipantKey {
    /// Create a participant entry
    pub fn new(participant_id: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            public_key: public_key.into(),
        }
    }
}

/// One participant's wrapped copy of the conversation key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKeyEntry {
    /// Participant id (username)
    pub participant_id: String,
    /// Base64 RSA-OAEP ciphertext of the key
    pub wrapped_key: String,
}

/// A participant that could not be given a wrapped key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionFailure {
    /// Participant id (username)
    pub participant_id: String,
    /// What went wrong
    pub reason: String,
}

/// Wrapped entries keyed by participant id
///
/// Immutable once built; the map is what gets published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distribution {
    entries: BTreeMap<String, WrappedKeyEntry>,
}

impl Distribution {
    /// Entry for one participant
    pub fn get(&self, participant_id: &str) -> Option<&WrappedKeyEntry> {
        self.entries.get(participant_id)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `participant id → wrapped key` map for the publish call
    pub fn encrypted_keys(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.wrapped_key.clone()))
            .collect()
    }
}

/// Wrap `key` once for every participant
///
/// ## Errors
///
/// - `Validation`: empty participant set or a repeated participant id
/// - `PartialDistribution`: at least one participant had a missing or
///   unusable public key. Carries both the failures and the entries that
///   did succeed. Nothing should be published in that case.
pub fn distribute(key: &ConversationKey, participants: &[ParticipantKey]) -> Result<Distribution> {
    if participants.is_empty() {
        return Err(Error::Validation("no participants to distribute to".into()));
    }

    let mut seen = HashSet::with_capacity(participants.len());
    for p in participants {
        if !seen.insert(p.participant_id.as_str()) {
            return Err(Error::Validation(format!(
                "participant {} listed more than once",
                p.participant_id
            )));
        }
    }

    let mut entries = BTreeMap::new();
    let mut failed = Vec::new();

    for p in participants {
        match wrap_for(key, p) {
            Ok(wrapped_key) => {
                entries.insert(
                    p.participant_id.clone(),
                    WrappedKeyEntry {
                        participant_id: p.participant_id.clone(),
                        wrapped_key,
                    },
                );
            }
            Err(e) => failed.push(DistributionFailure {
                participant_id: p.participant_id.clone(),
                reason: e.to_string(),
            }),
        }
    }

    let distribution = Distribution { entries };

    if !failed.is_empty() {
        tracing::warn!(
            "Key distribution incomplete: {} of {} participants failed",
            failed.len(),
            participants.len()
        );
        return Err(Error::PartialDistribution {
            failed,
            distributed: distribution,
        });
    }

    tracing::debug!("Wrapped conversation key for {} participants", distribution.len());
    Ok(distribution)
}

fn wrap_for(key: &ConversationKey, participant: &ParticipantKey) -> Result<String> {
    if participant.public_key.trim().is_empty() {
        return Err(Error::InvalidKey("no public key on record".into()));
    }
    let public = IdentityPublicKey::from_base64(&participant.public_key)?;
    let wrapped = wrap_small_payload(&public, key.as_bytes())?;
    Ok(BASE64.encode(wrapped))
}

/// Recover the conversation key from the caller's own entry
///
/// ## Errors
///
/// - `Validation`: the entry is not base64, or did not hold a 32-byte key
/// - `KeyMismatch`: the entry was wrapped for someone else
pub fn unwrap_own_key(
    entry: &WrappedKeyEntry,
    own_private: &IdentityPrivateKey,
) -> Result<ConversationKey> {
    let ciphertext = BASE64.decode(entry.wrapped_key.trim())?;
    let raw = unwrap_small_payload(own_private, &ciphertext)?;

    let bytes: [u8; KEY_SIZE] = raw.as_slice().try_into().map_err(|_| {
        Error::Validation(format!(
            "unwrapped conversation key is {} bytes, expected {}",
            raw.len(),
            KEY_SIZE
        ))
    })?;

    Ok(ConversationKey::from_bytes(bytes))
}

// ============================================================================
// TESTS
// ============================================================================
