//! # Session Module
//!
//! One login session: the unlocked identity plus the conversation keys
//! opened since login.
//!
//! ## Session Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       SESSION LIFECYCLE                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Session::register / Session::login / Session::login_remote            │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌──────────────────────────────────────────────────────────────┐      │
//! │  │ Session { identity, SessionKeyCache (empty), CoreConfig }   │      │
//! │  └──────────────────────────────────────────────────────────────┘      │
//! │        │                                                                │
//! │        ├── create_conversation ── mint + distribute + publish + cache  │
//! │        ├── open_conversation ──── unwrap own entry (cached after)      │
//! │        ├── encrypt_message ────── codec::encrypt with cached key       │
//! │        ├── decrypt_message ────── codec::decrypt with cached key       │
//! │        ├── decrypt_history ────── open + decode every stored frame     │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  logout(self) ── cache cleared, identity dropped (keys zeroized)       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no global session. Callers own the `Session` and pass it by
//! reference; `logout` consumes it so nothing can use it afterwards.

mod cache;

pub use cache::SessionKeyCache;

use crate::error::{Error, Result};
use crate::identity::{Identity, RegistrationRequest};
use crate::messaging::{
    codec, create_conversation_key, distribute, unwrap_own_key, ConversationKey,
    ConversationRecord, Message, PublishKeysRequest,
};
use crate::storage::KeyStore;
use crate::transport::{AccountService, ConversationService};
use crate::CoreConfig;

/// An unlocked identity and its conversation keys
pub struct Session {
    identity: Identity,
    cache: SessionKeyCache,
    config: CoreConfig,
}

impl Session {
    /// Start a session for an unlocked identity
    pub fn new(identity: Identity) -> Self {
        Self::with_config(identity, CoreConfig::default())
    }

    /// Start a session with explicit configuration
    pub fn with_config(identity: Identity, config: CoreConfig) -> Self {
        if config.verbose_logging {
            tracing::debug!("Session config: {:?}", config);
        }
        tracing::info!("Session started for {}", identity.username());
        Self {
            identity,
            cache: SessionKeyCache::new(),
            config,
        }
    }

    /// Register a new identity, store its keys locally, and start a session
    ///
    /// The returned request still has to be sent to the account service.
    pub fn register<S: KeyStore + ?Sized>(
        store: &S,
        username: &str,
        password: &str,
    ) -> Result<(Self, RegistrationRequest)> {
        let (identity, request) = Identity::register(username, password)?;
        store.put(username, identity.stored_keys())?;
        Ok((Self::new(identity), request))
    }

    /// Log in from the key record in local secure storage
    ///
    /// A missing record is reported as `Authentication`, like a wrong
    /// password.
    pub fn login<S: KeyStore + ?Sized>(store: &S, username: &str, password: &str) -> Result<Self> {
        let keys = store.get(username)?.ok_or_else(|| {
            tracing::warn!("No local key record for {}", username);
            Error::Authentication
        })?;
        let identity = Identity::login(username, password, &keys)?;
        Ok(Self::new(identity))
    }

    /// Log in through the account service and refresh local storage
    pub async fn login_remote<A, S>(
        account: &A,
        store: &S,
        username: &str,
        password: &str,
    ) -> Result<Self>
    where
        A: AccountService + ?Sized,
        S: KeyStore + ?Sized,
    {
        let response = account.login(username, password).await?;
        let identity = Identity::from_login_response(username, password, &response)?;
        store.put(username, identity.stored_keys())?;
        Ok(Self::new(identity))
    }

    /// The unlocked identity
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The conversation key cache
    pub fn cache(&self) -> &SessionKeyCache {
        &self.cache
    }

    /// The active configuration
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Create a conversation and hand its key to every participant
    ///
    /// ## Flow
    ///
    /// 1. The service creates the record and returns every participant's
    ///    public key.
    /// 2. A fresh key is minted and wrapped for all of them. This finishes
    ///    before anything else goes over the wire.
    /// 3. The wrapped map is published and the key is cached.
    ///
    /// If any participant cannot be served, `PartialDistribution` is
    /// returned and nothing is published or cached.
    pub async fn create_conversation<C>(
        &self,
        service: &C,
        participants: &[String],
    ) -> Result<ConversationRecord>
    where
        C: ConversationService + ?Sized,
    {
        let me = self.identity.username();
        let my_public = self.identity.public_key().to_base64()?;

        let mut record = service.create_conversation(me, &my_public, participants).await?;

        let key = create_conversation_key();
        let distribution = distribute(&key, &record.participant_keys())?;
        let encrypted_keys = distribution.encrypted_keys();

        service
            .publish_keys(PublishKeysRequest {
                conversation_id: record.id.clone(),
                encrypted_keys: encrypted_keys.clone(),
            })
            .await?;

        record.apply_encrypted_keys(&encrypted_keys);
        self.cache.put(record.id.clone(), key);

        tracing::info!(
            "Created conversation {} with {} participants",
            record.id,
            record.participants.len()
        );
        Ok(record)
    }

    /// Make a conversation's key available, unwrapping it on first use
    ///
    /// ## Errors
    ///
    /// - `ConversationNotFound`: no published entry for this user
    /// - `KeyMismatch`: the entry was not wrapped for this identity
    pub fn open_conversation(&self, record: &ConversationRecord) -> Result<ConversationKey> {
        let me = self.identity.username();

        self.cache.get_or_unwrap(&record.id, || {
            let entry = record
                .entry_for(me)
                .ok_or_else(|| Error::ConversationNotFound(record.id.clone()))?;
            let key = unwrap_own_key(&entry, self.identity.private_key())?;
            tracing::info!("Opened conversation {}", record.id);
            Ok(key)
        })
    }

    /// Open a conversation and decode its stored history, oldest first
    ///
    /// Each frame is returned with its plaintext. One bad frame fails the
    /// whole call: `Authentication` for a tag failure, `Validation` for a
    /// frame that belongs to another conversation.
    pub fn decrypt_history(&self, record: &ConversationRecord) -> Result<Vec<(Message, String)>> {
        let key = self.open_conversation(record)?;

        let history = record
            .messages
            .iter()
            .map(|message| {
                if message.conversation_id != record.id {
                    return Err(Error::Validation(format!(
                        "message {} belongs to {}, not {}",
                        message.id, message.conversation_id, record.id
                    )));
                }
                let text = codec::decrypt(&message.content, &key)?;
                Ok((message.clone(), text))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("Decrypted {} messages in {}", history.len(), record.id);
        Ok(history)
    }

    /// The conversations this user takes part in
    pub async fn conversations<C>(&self, service: &C) -> Result<Vec<ConversationRecord>>
    where
        C: ConversationService + ?Sized,
    {
        service.user_conversations(self.identity.username()).await
    }

    /// Encrypt `text` for a conversation and frame it for the relay
    pub fn encrypt_message(&self, conversation_id: &str, to: &str, text: &str) -> Result<Message> {
        if text.len() > self.config.max_message_size {
            return Err(Error::InvalidMessageContent(format!(
                "message is {} bytes, maximum is {}",
                text.len(),
                self.config.max_message_size
            )));
        }

        let key = self.key_for(conversation_id)?;
        let content = codec::encrypt(text, &key)?;
        Ok(Message::new(conversation_id, self.identity.username(), to, content))
    }

    /// Decrypt a received message frame
    pub fn decrypt_message(&self, message: &Message) -> Result<String> {
        let key = self.key_for(&message.conversation_id)?;
        codec::decrypt(&message.content, &key)
    }

    /// End the session, dropping every key it held
    ///
    /// Returns how many conversation keys were discarded.
    pub fn logout(self) -> usize {
        let dropped = self.cache.len();
        self.cache.clear();
        tracing::info!("Logged out {}", self.identity.username());
        dropped
    }

    fn key_for(&self, conversation_id: &str) -> Result<ConversationKey> {
        self.cache
            .get(conversation_id)
            .ok_or_else(|| Error::ConversationNotFound(conversation_id.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_wrapping_key, IdentityKeyPair, Salt};
    use crate::identity::{vault, StoredKeys};
    use crate::storage::SecureStore;
    use crate::test_support::{alice, bob, carol};
    use crate::transport::InMemoryDirectory;

    const PASSWORD: &str = "correct horse";

    fn stored_for(pair: &IdentityKeyPair) -> StoredKeys {
        let salt = Salt::generate();
        let key = derive_wrapping_key(PASSWORD, &salt).unwrap();
        StoredKeys {
            public_key: pair.public().to_base64().unwrap(),
            encrypted_private_key: vault::wrap(pair.private(), &key).unwrap(),
            salt_base64: salt.to_base64(),
        }
    }

    /// Session backed by a fixture key, registered in `directory`
    async fn session_for(
        directory: &InMemoryDirectory,
        username: &str,
        pair: &IdentityKeyPair,
    ) -> Session {
        let keys = stored_for(pair);
        directory
            .register(RegistrationRequest {
                username: username.into(),
                password: PASSWORD.into(),
                public_key: keys.public_key.clone(),
                encrypted_private_key: keys.encrypted_private_key.clone(),
                salt_base64: keys.salt_base64.clone(),
            })
            .await
            .unwrap();
        Session::new(Identity::login(username, PASSWORD, &keys).unwrap())
    }

    #[tokio::test]
    async fn test_alice_and_bob_exchange_messages() {
        let directory = InMemoryDirectory::new();
        let alice_session = session_for(&directory, "alice", alice()).await;
        let bob_session = session_for(&directory, "bob", bob()).await;

        let record = alice_session
            .create_conversation(&directory, &["bob".to_string()])
            .await
            .unwrap();
        assert!(alice_session.cache().contains(&record.id));

        let message = alice_session
            .encrypt_message(&record.id, "bob", "hi bob")
            .unwrap();
        assert_ne!(message.content, "hi bob");

        let published = directory.conversation(&record.id).unwrap();
        bob_session.open_conversation(&published).unwrap();
        assert_eq!(bob_session.decrypt_message(&message).unwrap(), "hi bob");

        let reply = bob_session
            .encrypt_message(&record.id, "alice", "hi alice")
            .unwrap();
        assert_eq!(alice_session.decrypt_message(&reply).unwrap(), "hi alice");
    }

    #[tokio::test]
    async fn test_partial_distribution_publishes_nothing() {
        let directory = InMemoryDirectory::new();
        let alice_session = session_for(&directory, "alice", alice()).await;
        let _carol = session_for(&directory, "carol", carol()).await;

        let result = alice_session
            .create_conversation(&directory, &["carol".to_string(), "ghost".to_string()])
            .await;

        match result {
            Err(Error::PartialDistribution { failed, distributed }) => {
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].participant_id, "ghost");
                assert!(distributed.get("carol").is_some());
                assert!(distributed.get("alice").is_some());
            }
            other => panic!("expected partial distribution, got {:?}", other.map(|r| r.id)),
        }

        assert!(alice_session.cache().is_empty());
        for record in directory.user_conversations("alice").await.unwrap() {
            assert!(record.entry_for("carol").is_none());
        }
    }

    #[tokio::test]
    async fn test_open_without_entry_is_not_found() {
        let directory = InMemoryDirectory::new();
        let alice_session = session_for(&directory, "alice", alice()).await;
        let carol_session = session_for(&directory, "carol", carol()).await;
        let _bob = session_for(&directory, "bob", bob()).await;

        let record = alice_session
            .create_conversation(&directory, &["bob".to_string()])
            .await
            .unwrap();

        let result = carol_session.open_conversation(&record);
        assert!(matches!(result, Err(Error::ConversationNotFound(_))));
        assert!(carol_session.cache().is_empty());
    }

    #[tokio::test]
    async fn test_open_with_foreign_entry_is_key_mismatch() {
        let directory = InMemoryDirectory::new();
        let alice_session = session_for(&directory, "alice", alice()).await;
        let _bob = session_for(&directory, "bob", bob()).await;

        let mut record = alice_session
            .create_conversation(&directory, &["bob".to_string()])
            .await
            .unwrap();

        // Give alice bob's wrapped copy
        let bobs = record.participants["bob"].encrypted_symmetric_key.clone();
        record.participants.get_mut("alice").unwrap().encrypted_symmetric_key = bobs;
        alice_session.cache().clear();

        let result = alice_session.open_conversation(&record);
        assert!(matches!(result, Err(Error::KeyMismatch)));
    }

    #[test]
    fn test_message_for_unopened_conversation() {
        let session = Session::new(Identity::login("bob", PASSWORD, &stored_for(bob())).unwrap());

        assert!(matches!(
            session.encrypt_message("nope", "alice", "hi"),
            Err(Error::ConversationNotFound(_))
        ));

        let frame = Message::new("nope", "alice", "bob", String::new());
        assert!(matches!(
            session.decrypt_message(&frame),
            Err(Error::ConversationNotFound(_))
        ));
    }

    #[test]
    fn test_configured_message_limit() {
        let identity = Identity::login("bob", PASSWORD, &stored_for(bob())).unwrap();
        let session = Session::with_config(
            identity,
            CoreConfig {
                max_message_size: 4,
                ..CoreConfig::default()
            },
        );
        session.cache().put("c", create_conversation_key());

        assert!(session.encrypt_message("c", "alice", "abcd").is_ok());
        assert!(matches!(
            session.encrypt_message("c", "alice", "abcde"),
            Err(Error::InvalidMessageContent(_))
        ));
    }

    #[test]
    fn test_login_from_key_store() {
        let store = SecureStore::new();
        store.put("bob", &stored_for(bob())).unwrap();

        let session = Session::login(&store, "bob", PASSWORD).unwrap();
        assert_eq!(session.identity().public_key(), bob().public());

        assert!(matches!(
            Session::login(&store, "bob", "wrong"),
            Err(Error::Authentication)
        ));
        assert!(matches!(
            Session::login(&store, "nobody", PASSWORD),
            Err(Error::Authentication)
        ));
    }

    #[tokio::test]
    async fn test_register_then_login_remote() {
        let directory = InMemoryDirectory::new();
        let store = SecureStore::new();

        let (session, request) = Session::register(&store, "dave", PASSWORD).unwrap();
        directory.register(request).await.unwrap();
        let public = session.identity().public_key().clone();
        session.logout();

        let other_device = SecureStore::new();
        let session = Session::login_remote(&directory, &other_device, "dave", PASSWORD)
            .await
            .unwrap();

        assert_eq!(session.identity().public_key(), &public);
        assert!(other_device.get("dave").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_logout_clears_cache() {
        let directory = InMemoryDirectory::new();
        let alice_session = session_for(&directory, "alice", alice()).await;
        let _bob = session_for(&directory, "bob", bob()).await;

        alice_session
            .create_conversation(&directory, &["bob".to_string()])
            .await
            .unwrap();
        assert_eq!(alice_session.cache().len(), 1);

        assert_eq!(alice_session.logout(), 1);
    }

    /// Creates through the directory, then fails every publish
    struct UnreachablePublisher {
        directory: InMemoryDirectory,
    }

    #[async_trait::async_trait]
    impl ConversationService for UnreachablePublisher {
        async fn create_conversation(
            &self,
            creator: &str,
            creator_public_key: &str,
            participants: &[String],
        ) -> Result<ConversationRecord> {
            self.directory
                .create_conversation(creator, creator_public_key, participants)
                .await
        }

        async fn publish_keys(&self, _request: PublishKeysRequest) -> Result<()> {
            Err(Error::Transport("connection reset".into()))
        }

        async fn user_conversations(&self, username: &str) -> Result<Vec<ConversationRecord>> {
            self.directory.user_conversations(username).await
        }
    }

    #[tokio::test]
    async fn test_publish_failure_is_transport_and_caches_nothing() {
        let directory = InMemoryDirectory::new();
        let alice_session = session_for(&directory, "alice", alice()).await;
        let _bob = session_for(&directory, "bob", bob()).await;
        let service = UnreachablePublisher { directory };

        let err = alice_session
            .create_conversation(&service, &["bob".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert!(err.is_recoverable());
        assert!(alice_session.cache().is_empty());

        for record in service.directory.user_conversations("alice").await.unwrap() {
            assert!(record.entry_for("bob").is_none());
        }
    }

    #[tokio::test]
    async fn test_decrypt_history_after_login() {
        let directory = InMemoryDirectory::new();
        let alice_session = session_for(&directory, "alice", alice()).await;
        let bob_session = session_for(&directory, "bob", bob()).await;

        let record = alice_session
            .create_conversation(&directory, &["bob".to_string()])
            .await
            .unwrap();
        for (from, to, text) in [("alice", "bob", "one"), ("bob", "alice", "two")] {
            let session = if from == "alice" { &alice_session } else { &bob_session };
            if from == "bob" {
                let published = directory.conversation(&record.id).unwrap();
                session.open_conversation(&published).unwrap();
            }
            directory
                .deliver(session.encrypt_message(&record.id, to, text).unwrap())
                .unwrap();
        }

        // Fresh session: nothing cached, history comes from the listing
        let bob_again = Session::new(
            Identity::login("bob", PASSWORD, &stored_for(bob())).unwrap(),
        );
        let listed = bob_again.conversations(&directory).await.unwrap();
        assert_eq!(listed.len(), 1);

        let history = bob_again.decrypt_history(&listed[0]).unwrap();
        let texts: Vec<&str> = history.iter().map(|(_, text)| text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(history[0].0.from, "alice");
        assert!(bob_again.cache().contains(&record.id));
    }

    #[tokio::test]
    async fn test_decrypt_history_rejects_tampered_or_foreign_frames() {
        let directory = InMemoryDirectory::new();
        let alice_session = session_for(&directory, "alice", alice()).await;
        let _bob = session_for(&directory, "bob", bob()).await;

        let record = alice_session
            .create_conversation(&directory, &["bob".to_string()])
            .await
            .unwrap();
        let message = alice_session
            .encrypt_message(&record.id, "bob", "hello")
            .unwrap();

        let mut tampered = directory.conversation(&record.id).unwrap();
        let mut forged = message.clone();
        forged.content = codec::encrypt("hello", &create_conversation_key()).unwrap();
        tampered.messages.push(forged);
        assert!(matches!(
            alice_session.decrypt_history(&tampered),
            Err(Error::Authentication)
        ));

        let mut foreign = directory.conversation(&record.id).unwrap();
        let mut stray = message;
        stray.conversation_id = "elsewhere".into();
        foreign.messages.push(stray);
        assert!(matches!(
            alice_session.decrypt_history(&foreign),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_empty_history_still_requires_an_entry() {
        let session = Session::new(Identity::login("bob", PASSWORD, &stored_for(bob())).unwrap());
        let record = ConversationRecord {
            id: "c".into(),
            participants: Default::default(),
            messages: Vec::new(),
        };

        assert!(matches!(
            session.decrypt_history(&record),
            Err(Error::ConversationNotFound(_))
        ));
    }
}
