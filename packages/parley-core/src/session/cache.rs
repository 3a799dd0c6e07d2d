//! Per-session cache of unwrapped conversation keys.
//!
//! Keys are unwrapped with the identity private key the first time a
//! conversation is opened and kept here until logout. Nothing in this cache
//! is ever written to disk.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::Result;
use crate::messaging::ConversationKey;

/// Conversation id → conversation key, for one login session
///
/// `Send + Sync`; share it behind an `Arc` or a reference.
#[derive(Default)]
pub struct SessionKeyCache {
    keys: RwLock<HashMap<String, ConversationKey>>,
}

impl SessionKeyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the key for a conversation
    pub fn get(&self, conversation_id: &str) -> Option<ConversationKey> {
        self.keys.read().get(conversation_id).cloned()
    }

    /// Store the key for a conversation, replacing any previous one
    pub fn put(&self, conversation_id: impl Into<String>, key: ConversationKey) {
        self.keys.write().insert(conversation_id.into(), key);
    }

    /// Whether a key is cached for a conversation
    pub fn contains(&self, conversation_id: &str) -> bool {
        self.keys.read().contains_key(conversation_id)
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// Drop every cached key
    ///
    /// Dropped keys zeroize themselves before this returns.
    pub fn clear(&self) {
        let mut keys = self.keys.write();
        let count = keys.len();
        keys.clear();
        tracing::debug!("Cleared {} cached conversation keys", count);
    }

    /// Return the cached key, or compute it with `unwrap` and cache it
    ///
    /// `unwrap` runs outside the lock. Two callers racing on the same
    /// conversation may both run it; since they unwrap the same entry, the
    /// second insert replaces an identical key.
    pub fn get_or_unwrap<F>(&self, conversation_id: &str, unwrap: F) -> Result<ConversationKey>
    where
        F: FnOnce() -> Result<ConversationKey>,
    {
        if let Some(key) = self.get(conversation_id) {
            return Ok(key);
        }

        let key = unwrap()?;
        self.put(conversation_id, key.clone());
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::error::Error;

    #[test]
    fn test_put_get_clear() {
        let cache = SessionKeyCache::new();
        assert!(cache.is_empty());

        cache.put("c1", ConversationKey::from_bytes([1u8; 32]));
        cache.put("c2", ConversationKey::from_bytes([2u8; 32]));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("c1"));
        assert_eq!(cache.get("c2").unwrap().as_bytes(), &[2u8; 32]);
        assert!(cache.get("missing").is_none());

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("c1").is_none());
    }

    #[test]
    fn test_get_or_unwrap_runs_once_when_cached() {
        let cache = SessionKeyCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let key = cache
                .get_or_unwrap("c1", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(ConversationKey::from_bytes([5u8; 32]))
                })
                .unwrap();
            assert_eq!(key.as_bytes(), &[5u8; 32]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_or_unwrap_failure_caches_nothing() {
        let cache = SessionKeyCache::new();
        let result = cache.get_or_unwrap("c1", || Err(Error::KeyMismatch));

        assert!(matches!(result, Err(Error::KeyMismatch)));
        assert!(!cache.contains("c1"));
    }

    #[test]
    fn test_concurrent_first_open_converges() {
        let cache = Arc::new(SessionKeyCache::new());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    let key = cache
                        .get_or_unwrap("shared", || Ok(ConversationKey::from_bytes([9u8; 32])))
                        .unwrap();
                    assert_eq!(key.as_bytes(), &[9u8; 32]);
                });
            }
        });

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("shared").unwrap().as_bytes(), &[9u8; 32]);
    }
}
