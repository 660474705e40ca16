//! In-memory session store.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::SessionStore;

/// A [`SessionStore`] backed by a `HashMap`. Used in tests and for embedders
/// that manage persistence themselves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.write().insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert!(store.get("token").is_none());
        store.set("token", "abc");
        assert_eq!(store.get("token").as_deref(), Some("abc"));
        store.remove("token");
        assert!(store.get("token").is_none());
    }

    #[test]
    fn test_overwrite() {
        let store = MemoryStore::new();
        store.set("k", "1");
        store.set("k", "2");
        assert_eq!(store.get("k").as_deref(), Some("2"));
    }
}
