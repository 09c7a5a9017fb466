//! Small persistent key/value storage, the client's equivalent of browser
//! local storage.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::error::{ClientError, Result};

pub const GUEST_ID_KEY: &str = "guestId";
pub const CONVERSATION_ID_KEY: &str = "conversationId";
pub const MESSAGES_KEY: &str = "messages";

pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        Ok(())
    }
}

/// JSON object on disk, rewritten in full on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// `<data dir>/promptx/local-storage.json`
    pub fn open_default() -> Result<Self> {
        let data_dir = dirs_next::data_dir()
            .ok_or_else(|| ClientError::Invalid("Cannot determine data directory".into()))?;
        Self::open(data_dir.join("promptx").join("local-storage.json"))
    }

    /// Load `path` if it exists; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            HashMap::new()
        };
        Ok(Self { path, entries: Mutex::new(entries) })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;

        // Write atomically using temp file + rename
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("promptx-store-{}", uuid::Uuid::new_v4()))
            .join("local-storage.json")
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = temp_path();
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get(GUEST_ID_KEY), None);

        store.set(GUEST_ID_KEY, "g1.sig").unwrap();
        store.set(CONVERSATION_ID_KEY, "c1").unwrap();
        store.remove(CONVERSATION_ID_KEY).unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(GUEST_ID_KEY).as_deref(), Some("g1.sig"));
        assert_eq!(reopened.get(CONVERSATION_ID_KEY), None);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(FileStore::open(&path), Err(ClientError::Json(_))));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        store.set(MESSAGES_KEY, "[]").unwrap();
        assert_eq!(store.get(MESSAGES_KEY).as_deref(), Some("[]"));
        store.remove(MESSAGES_KEY).unwrap();
        assert_eq!(store.get(MESSAGES_KEY), None);
    }
}
