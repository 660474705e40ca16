//! File-backed session store.
//!
//! Persists the whole key/value map as a single JSON document, written
//! through on every mutation. A missing or corrupt file yields an empty
//! store; the session then starts as an unauthenticated guest.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::warn;

use super::SessionStore;

/// A [`SessionStore`] persisted as a JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open a store at `path`, loading existing entries.
    ///
    /// A missing file is an empty store. A corrupt file is discarded with a
    /// warning and replaced on the next write.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path);
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    fn persist(&self, entries: &HashMap<String, String>) {
        let json = match serde_json::to_string_pretty(entries) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "failed to serialize session store");
                return;
            }
        };
        if let Some(parent) = self.path.parent()
            && let Err(err) = fs::create_dir_all(parent)
        {
            warn!(error = %err, path = %self.path.display(), "failed to create store directory");
            return;
        }
        if let Err(err) = fs::write(&self.path, json) {
            warn!(error = %err, path = %self.path.display(), "failed to write session store");
        }
    }
}

fn load_entries(path: &Path) -> HashMap<String, String> {
    let Ok(raw) = fs::read_to_string(path) else {
        return HashMap::new();
    };
    match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "corrupt session store file, starting empty");
            HashMap::new()
        }
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.write();
        entries.insert(key.to_owned(), value.to_owned());
        self.persist(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.persist(&entries);
        }
    }
}
