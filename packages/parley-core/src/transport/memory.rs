//! In-memory account and conversation directory.
//!
//! Stands in for the remote services in tests and the demo. Unknown
//! participants are recorded with an empty public key, the same shape a
//! real directory returns for a user who never published one.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{AccountService, ConversationService};
use crate::error::{Error, Result};
use crate::identity::{LoginKeys, LoginResponse, RegistrationRequest};
use crate::messaging::{ConversationRecord, Message, Participant, PublishKeysRequest};

/// Shared in-memory directory of accounts and conversations
#[derive(Default)]
pub struct InMemoryDirectory {
    accounts: RwLock<HashMap<String, RegistrationRequest>>,
    conversations: RwLock<HashMap<String, ConversationRecord>>,
}

impl InMemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Public key on file for `username`
    pub fn public_key_of(&self, username: &str) -> Option<String> {
        self.accounts.read().get(username).map(|a| a.public_key.clone())
    }

    /// Current state of a conversation
    pub fn conversation(&self, id: &str) -> Option<ConversationRecord> {
        self.conversations.read().get(id).cloned()
    }

    /// Append a ciphertext frame to its conversation's history
    ///
    /// Plays the part of the relay, which stores every frame it forwards.
    pub fn deliver(&self, message: Message) -> Result<()> {
        let mut conversations = self.conversations.write();
        let record = conversations
            .get_mut(&message.conversation_id)
            .ok_or_else(|| Error::ConversationNotFound(message.conversation_id.clone()))?;

        tracing::debug!("Directory stored message {} in {}", message.id, record.id);
        record.messages.push(message);
        Ok(())
    }
}

#[async_trait]
impl AccountService for InMemoryDirectory {
    async fn register(&self, request: RegistrationRequest) -> Result<()> {
        let mut accounts = self.accounts.write();
        if accounts.contains_key(&request.username) {
            return Err(Error::Validation(format!(
                "username {} is taken",
                request.username
            )));
        }
        tracing::debug!("Directory registered {}", request.username);
        accounts.insert(request.username.clone(), request);
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let accounts = self.accounts.read();
        let account = accounts
            .get(username)
            .filter(|a| a.password == password)
            .ok_or(Error::Authentication)?;

        Ok(LoginResponse {
            token: Uuid::new_v4().to_string(),
            keys: LoginKeys {
                public: account.public_key.clone(),
                encrypted_private: account.encrypted_private_key.clone(),
                salt_base64: account.salt_base64.clone(),
            },
        })
    }
}

#[async_trait]
impl ConversationService for InMemoryDirectory {
    async fn create_conversation(
        &self,
        creator: &str,
        creator_public_key: &str,
        participants: &[String],
    ) -> Result<ConversationRecord> {
        let mut members = BTreeMap::new();
        members.insert(
            creator.to_string(),
            Participant {
                username: creator.to_string(),
                public_key: creator_public_key.to_string(),
                encrypted_symmetric_key: String::new(),
            },
        );

        for username in participants.iter().filter(|u| u.as_str() != creator) {
            let public_key = self.public_key_of(username).unwrap_or_default();
            members.insert(
                username.clone(),
                Participant {
                    username: username.clone(),
                    public_key,
                    encrypted_symmetric_key: String::new(),
                },
            );
        }

        let record = ConversationRecord {
            id: Uuid::new_v4().to_string(),
            participants: members,
            messages: Vec::new(),
        };
        self.conversations
            .write()
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn publish_keys(&self, request: PublishKeysRequest) -> Result<()> {
        let mut conversations = self.conversations.write();
        let record = conversations
            .get_mut(&request.conversation_id)
            .ok_or_else(|| Error::ConversationNotFound(request.conversation_id.clone()))?;

        record.apply_encrypted_keys(&request.encrypted_keys);
        Ok(())
    }

    async fn user_conversations(&self, username: &str) -> Result<Vec<ConversationRecord>> {
        let mut found: Vec<ConversationRecord> = self
            .conversations
            .read()
            .values()
            .filter(|c| c.has_participant(username))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }
}
