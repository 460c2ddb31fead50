//! Local persistent key/value storage and the remembered-credential slot.
//!
//! The stored credential is plaintext on disk, readable by anything running
//! as the same user. Nothing here tries to protect it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::ChatError;

/// Key of the single slot holding the remembered credential.
pub const CREDENTIAL_KEY: &str = "gemini_api_key";

/// Synchronous string storage addressed by key.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, ChatError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ChatError>;
    fn remove(&self, key: &str) -> Result<(), ChatError>;
}

/// Stores all keys in one JSON object file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `storage.json` next to the config file
    pub fn default_location() -> Result<Self, ChatError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ChatError::Storage("could not determine config directory".into()))?;

        Ok(Self::new(config_dir.join("chatwidget").join("storage.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, ChatError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), ChatError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, ChatError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ChatError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), ChatError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, ChatError> {
        self.entries
            .lock()
            .map_err(|_| ChatError::Storage("memory store poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ChatError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ChatError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ChatError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// The remembered-credential slot. Storage failures never reach the caller;
/// the credential then simply lives in memory for the session.
pub struct CredentialStore {
    store: Box<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load_credential(&self) -> String {
        match self.store.get(CREDENTIAL_KEY) {
            Ok(Some(value)) => {
                debug!("loaded remembered credential");
                value
            }
            Ok(None) => String::new(),
            Err(e) => {
                warn!(error = %e, "could not read remembered credential");
                String::new()
            }
        }
    }

    pub fn save_credential(&self, value: &str) {
        if let Err(e) = self.store.set(CREDENTIAL_KEY, value) {
            warn!(error = %e, "could not remember credential");
        }
    }

    pub fn clear_credential(&self) {
        if let Err(e) = self.store.remove(CREDENTIAL_KEY) {
            warn!(error = %e, "could not forget credential");
        }
    }
}
