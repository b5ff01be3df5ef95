use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::{Session, User};

pub const TOKEN_KEY: &str = "ti_auth_token";
pub const USER_KEY: &str = "ti_auth_user";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Durable string key-value storage backing the session.
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Stores all keys in a single JSON object file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> StorageResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    // A corrupt file is overwritten rather than blocking every later write.
    fn read_for_write(&self) -> StorageResult<BTreeMap<String, String>> {
        match self.read_all() {
            Err(StorageError::Json(err)) => {
                log::warn!("replacing unreadable {}: {err}", self.path.display());
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.read_for_write()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut entries = self.read_for_write()?;
        entries.remove(key);
        self.write_all(&entries)
    }
}

/// Process-local storage, used where nothing should touch disk.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: std::cell::RefCell<BTreeMap<String, String>>,
}

#[cfg(test)]
impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Load/save/clear lifecycle for the auth token and user. Storage failures
/// are logged and otherwise treated as an absent session.
pub struct SessionStore<S> {
    storage: S,
}

impl<S: KeyValueStorage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    #[cfg(test)]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn load(&self) -> Session {
        let token = match self.storage.get(TOKEN_KEY) {
            Ok(value) => value.filter(|token| !token.is_empty()),
            Err(err) => {
                log::warn!("could not read stored token: {err}");
                None
            }
        };

        let user = match self.storage.get(USER_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(err) => {
                    log::warn!("ignoring unreadable stored user: {err}");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                log::warn!("could not read stored user: {err}");
                None
            }
        };

        Session { token, user }
    }

    pub fn save(&self, token: &str, user: Option<&User>) {
        if let Err(err) = self.storage.set(TOKEN_KEY, token) {
            log::warn!("could not persist token: {err}");
            return;
        }

        let result = match user {
            Some(user) => serde_json::to_string(user)
                .map_err(StorageError::from)
                .and_then(|raw| self.storage.set(USER_KEY, &raw)),
            None => self.storage.remove(USER_KEY),
        };
        match result {
            Ok(()) => log::info!("session saved"),
            Err(err) => log::warn!("could not persist user: {err}"),
        }
    }

    pub fn clear(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(err) = self.storage.remove(key) {
                log::warn!("could not remove {key}: {err}");
            }
        }
        log::info!("session cleared");
    }
}
