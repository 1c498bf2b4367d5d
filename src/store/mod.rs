//! Credential storage for the current bearer token.
//!
//! A single slot holds at most one token. It is overwritten wholly on refresh
//! and removed wholly on logout or refresh failure.

pub mod secure;

pub use secure::Token;

use crate::error::StoreError;
use directories::ProjectDirs;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, error};
use zeroize::Zeroizing;

/// Slot contents; values are wiped when the map is dropped.
type Slots = HashMap<String, Zeroizing<String>>;

/// Slot key used when none is configured.
pub const DEFAULT_KEY: &str = "token";

/// A key-value slot that holds the current token.
pub trait CredentialStore: Send + Sync {
    /// Read the current token, if any.
    fn get(&self) -> Option<Token>;

    /// Replace the current token.
    fn set(&self, token: Token);

    /// Remove the current token.
    fn clear(&self);
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<Token>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `token`.
    pub fn with_token(token: impl Into<Token>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self) -> Option<Token> {
        lock(&self.slot).clone()
    }

    fn set(&self, token: Token) {
        *lock(&self.slot) = Some(token);
    }

    fn clear(&self) {
        *lock(&self.slot) = None;
    }
}

/// Store backed by a JSON file, so the session outlives the process.
///
/// The file is a flat object of slot keys to values; only `key` is touched.
/// It is only ever readable by its owner and is replaced atomically.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    key: String,
    io: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            io: Mutex::new(()),
        }
    }

    /// Place `file_name` under the platform data directory.
    ///
    /// Returns `~/.local/share/archival-auth/<file_name>` on Linux.
    pub fn in_data_dir(file_name: &str, key: impl Into<String>) -> Result<Self, StoreError> {
        let dirs =
            ProjectDirs::from("com", "example", "archival-auth").ok_or(StoreError::NoDataDir)?;
        Ok(Self::new(dirs.data_dir().join(file_name), key))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_slots(&self) -> Result<Slots, StoreError> {
        if !self.path.exists() {
            return Ok(Slots::new());
        }
        let content = Zeroizing::new(fs::read_to_string(&self.path)?);
        if content.trim().is_empty() {
            return Ok(Slots::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_slots(&self, slots: &Slots) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let content = Zeroizing::new(serde_json::to_string_pretty(slots)?);

        let mut file = NamedTempFile::new_in(parent)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file().set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(content.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut Slots)) -> Result<(), StoreError> {
        let _guard = lock(&self.io);
        // A corrupted file is replaced rather than blocking logout.
        let mut slots = self.read_slots().unwrap_or_else(|e| {
            error!("Discarding unreadable credential file {:?}: {}", self.path, e);
            Slots::new()
        });
        apply(&mut slots);
        self.write_slots(&slots)
    }
}

impl CredentialStore for FileStore {
    fn get(&self) -> Option<Token> {
        let _guard = lock(&self.io);
        match self.read_slots() {
            Ok(mut slots) => slots
                .remove(&self.key)
                .map(|value| Token::from(value.as_str())),
            Err(e) => {
                error!("Failed to read credential file {:?}: {}", self.path, e);
                None
            }
        }
    }

    fn set(&self, token: Token) {
        let key = self.key.clone();
        let value = Zeroizing::new(token.as_str().to_string());
        match self.update(|slots| {
            slots.insert(key, value);
        }) {
            Ok(()) => debug!("Stored token in {:?}", self.path),
            Err(e) => error!("Failed to store token in {:?}: {}", self.path, e),
        }
    }

    fn clear(&self) {
        match self.update(|slots| {
            slots.remove(&self.key);
        }) {
            Ok(()) => debug!("Cleared token from {:?}", self.path),
            Err(e) => {
                error!("Failed to clear token from {:?}: {}", self.path, e);
                // Leave no credential behind even if the rewrite failed.
                if let Err(e) = fs::remove_file(&self.path) {
                    error!("Failed to remove credential file {:?}: {}", self.path, e);
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get().is_none());

        store.set(Token::from("abc"));
        assert_eq!(store.get(), Some(Token::from("abc")));

        store.set(Token::from("def"));
        assert_eq!(store.get(), Some(Token::from("def")));

        store.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested/session.json"), DEFAULT_KEY);

        assert!(store.get().is_none());

        store.set(Token::from("jwt-1"));
        assert_eq!(store.get(), Some(Token::from("jwt-1")));

        store.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        FileStore::new(&path, DEFAULT_KEY).set(Token::from("persisted"));

        let reopened = FileStore::new(&path, DEFAULT_KEY);
        assert_eq!(reopened.get(), Some(Token::from("persisted")));
    }

    #[test]
    fn test_file_store_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

        let store = FileStore::new(&path, DEFAULT_KEY);
        store.set(Token::from("jwt"));
        store.clear();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("theme"));
        assert!(!content.contains("jwt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        // A pre-existing world-readable file must not keep its mode.
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileStore::new(&path, DEFAULT_KEY);
        store.set(Token::from("secret-jwt"));

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0, "credential file mode is {:o}", mode & 0o777);
        assert_eq!(store.get(), Some(Token::from("secret-jwt")));

        store.clear();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn test_file_store_corrupted_file_reads_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path, DEFAULT_KEY);
        assert!(store.get().is_none());

        store.set(Token::from("fresh"));
        assert_eq!(store.get(), Some(Token::from("fresh")));
    }

    #[test]
    fn test_data_dir_path() {
        if let Ok(store) = FileStore::in_data_dir("session.json", DEFAULT_KEY) {
            assert!(store.path().ends_with("session.json"));
        }
    }
}
