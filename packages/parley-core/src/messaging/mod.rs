//! # Messaging Module
//!
//! Conversation keys, the message codec, and the records exchanged with the
//! conversation service and the realtime relay.
//!
//! ## Message Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      MESSAGE ENCRYPTION                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Sender (Alice)                                                        │
//! │  ─────────────────────────────────────────────────────────────         │
//! │                                                                         │
//! │  1. Get conversation key                                               │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  SessionKeyCache hit, or unwrap_own_key(entry, private)    │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  2. Encrypt text                                                       │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  codec::encrypt("Hello Bob!", key)                         │       │
//! │  │  → base64(iv ‖ ciphertext ‖ tag)                           │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  3. Frame                                                              │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  Message { id, conversationId, from, to, content }         │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Recipient (Bob) reverses step 2 with the same key.                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod keys;

pub use codec::MAX_MESSAGE_SIZE;
pub use keys::{
    create_conversation_key, distribute, unwrap_own_key, ConversationKey, Distribution,
    DistributionFailure, ParticipantKey, WrappedKeyEntry,
};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Realtime message frame
///
/// `content` is the untouched codec output; the relay never sees plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message ID (UUID)
    pub id: String,
    /// Conversation this belongs to
    pub conversation_id: String,
    /// Sender username
    pub from: String,
    /// Recipient username
    pub to: String,
    /// Encrypted content
    pub content: String,
    /// Unix timestamp when sent (milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Message {
    /// Create a new outgoing frame around already-encrypted content
    pub fn new(
        conversation_id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        content: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            from: from.into(),
            to: to.into(),
            content,
            timestamp: Some(crate::time::now_timestamp_millis()),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One participant as recorded by the conversation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Username
    pub username: String,
    /// Base64 SPKI public key
    #[serde(default)]
    pub public_key: String,
    /// This participant's wrapped conversation key, empty until published
    #[serde(default)]
    pub encrypted_symmetric_key: String,
}

/// A conversation as recorded by the conversation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Conversation ID
    pub id: String,
    /// Participants keyed by username
    pub participants: BTreeMap<String, Participant>,
    /// Stored ciphertext history, oldest first
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ConversationRecord {
    /// Public keys of every participant, for [`distribute`]
    pub fn participant_keys(&self) -> Vec<ParticipantKey> {
        self.participants
            .values()
            .map(|p| ParticipantKey::new(p.username.clone(), p.public_key.clone()))
            .collect()
    }

    /// The wrapped key entry for `username`, if one has been published
    pub fn entry_for(&self, username: &str) -> Option<WrappedKeyEntry> {
        self.participants
            .get(username)
            .filter(|p| !p.encrypted_symmetric_key.is_empty())
            .map(|p| WrappedKeyEntry {
                participant_id: p.username.clone(),
                wrapped_key: p.encrypted_symmetric_key.clone(),
            })
    }

    /// Copy published wrapped keys into the participant records
    pub fn apply_encrypted_keys(&mut self, encrypted_keys: &BTreeMap<String, String>) {
        for (username, wrapped) in encrypted_keys {
            if let Some(p) = self.participants.get_mut(username) {
                p.encrypted_symmetric_key = wrapped.clone();
            }
        }
    }

    /// Whether `username` takes part in this conversation
    pub fn has_participant(&self, username: &str) -> bool {
        self.participants.contains_key(username)
    }
}

/// Publish body: `{conversationId, encryptedKeys}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishKeysRequest {
    /// Conversation ID
    pub conversation_id: String,
    /// Wrapped key per participant
    pub encrypted_keys: BTreeMap<String, String>,
}

// ============================================================================
// TESTS
// ============================================================================
