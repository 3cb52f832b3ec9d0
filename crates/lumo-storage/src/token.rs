//! High-level API for the session token.

use crate::{SecureStorage, StorageKeys, StorageResult};
use tracing::debug;

/// Owns the single session token persisted across app restarts.
///
/// All components read and write the token through this type, never through
/// a raw key or file, so clearing a session has exactly one choke point.
/// Writes replace the previous value; the platform credential stores swap
/// whole entries, so a reader never observes a torn token.
pub struct TokenStore {
    storage: Box<dyn SecureStorage>,
}

impl TokenStore {
    /// Create a new token store with the given storage backend
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Retrieve the session token, if one exists
    pub fn get_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::SESSION_TOKEN)
    }

    /// Store the session token, replacing any previous value
    pub fn set_token(&self, token: &str) -> StorageResult<()> {
        debug!("Storing session token");
        self.storage.set(StorageKeys::SESSION_TOKEN, token)
    }

    /// Remove the session token.
    ///
    /// Succeeds silently when no token exists.
    pub fn clear_token(&self) -> StorageResult<()> {
        let existed = self.storage.delete(StorageKeys::SESSION_TOKEN)?;
        debug!(existed = existed, "Cleared session token");
        Ok(())
    }

    /// Check whether a session token exists
    pub fn has_token(&self) -> StorageResult<bool> {
        self.storage.has(StorageKeys::SESSION_TOKEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory storage for testing
    struct MemoryStorage {
        data: Mutex<HashMap<String, String>>,
    }

    impl MemoryStorage {
        fn new() -> Self {
            Self {
                data: Mutex::new(HashMap::new()),
            }
        }
    }

    impl SecureStorage for MemoryStorage {
        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        fn delete(&self, key: &str) -> StorageResult<bool> {
            Ok(self.data.lock().unwrap().remove(key).is_some())
        }
    }

    fn create_test_store() -> TokenStore {
        TokenStore::new(Box::new(MemoryStorage::new()))
    }

    #[test]
    fn test_empty_store_has_no_token() {
        let store = create_test_store();
        assert!(!store.has_token().unwrap());
        assert_eq!(store.get_token().unwrap(), None);
    }

    #[test]
    fn test_set_and_get_token() {
        let store = create_test_store();
        store.set_token("tok-123").unwrap();
        assert!(store.has_token().unwrap());
        assert_eq!(store.get_token().unwrap(), Some("tok-123".to_string()));
    }

    #[test]
    fn test_set_replaces_previous_token() {
        let store = create_test_store();
        store.set_token("tok-a").unwrap();
        store.set_token("tok-b").unwrap();
        assert_eq!(store.get_token().unwrap(), Some("tok-b".to_string()));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = create_test_store();

        // Clearing an empty store succeeds
        store.clear_token().unwrap();
        assert_eq!(store.get_token().unwrap(), None);

        store.set_token("tok-123").unwrap();
        store.clear_token().unwrap();
        assert_eq!(store.get_token().unwrap(), None);

        // Clearing twice in a row succeeds and leaves the store empty
        store.clear_token().unwrap();
        assert_eq!(store.get_token().unwrap(), None);
    }
}
