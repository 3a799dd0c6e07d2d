//! # Transport Collaborators
//!
//! Boundaries to the remote account and conversation services.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     COLLABORATOR BOUNDARY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   parley-core                          remote services                  │
//! │   ───────────                          ───────────────                  │
//! │                                                                         │
//! │   Identity::register ──RegistrationRequest──► AccountService::register  │
//! │   Session::login_remote ◄──LoginResponse──── AccountService::login      │
//! │                                                                         │
//! │   Session::create_conversation                                          │
//! │       ├──(creator, publicKey, ids)──► ConversationService::create       │
//! │       │◄──────── ConversationRecord ──┘                                 │
//! │       │  distribute() runs here, fully, before the next call            │
//! │       └──PublishKeysRequest─────────► ConversationService::publish_keys │
//! │                                                                         │
//! │   Session::conversations ◄──[ConversationRecord]── user_conversations   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Implementations own retries and timeouts. Every failure they surface
//! should be [`Error::Transport`](crate::Error::Transport) so callers can
//! tell it apart from a cryptographic failure.

mod memory;

pub use memory::InMemoryDirectory;

use async_trait::async_trait;

use crate::error::Result;
use crate::identity::{LoginResponse, RegistrationRequest};
use crate::messaging::{ConversationRecord, PublishKeysRequest};

/// Remote account storage
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Create an account from a registration body
    async fn register(&self, request: RegistrationRequest) -> Result<()>;

    /// Authenticate and fetch the user's key record
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse>;
}

/// Remote conversation storage
#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Create a conversation record for `creator` and `participants`
    ///
    /// The returned record lists every participant with the public key the
    /// service has on file, the creator included.
    async fn create_conversation(
        &self,
        creator: &str,
        creator_public_key: &str,
        participants: &[String],
    ) -> Result<ConversationRecord>;

    /// Publish the wrapped key map for a conversation
    async fn publish_keys(&self, request: PublishKeysRequest) -> Result<()>;

    /// Every conversation `username` takes part in, history included
    async fn user_conversations(&self, username: &str) -> Result<Vec<ConversationRecord>>;
}
