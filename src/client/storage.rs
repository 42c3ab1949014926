//! Durable key-value storage
//!
//! The client persists a handful of string values across restarts: the
//! credential pair, the current view and the optional API base override.
//! [`KeyValueStore`] is the contract; [`FileStore`] keeps everything in one
//! JSON file under the platform data directory and [`MemoryStore`] keeps it
//! in process.
//!
//! Every mutation is durable when the call returns. An empty value is
//! equivalent to an absent key.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;

use crate::shared::error::StorageError;

/// Keys of the persisted client state
pub mod keys {
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const CURRENT_VIEW: &str = "currentView";
    pub const CURRENT_POST_ID: &str = "currentPostId";
    pub const CURRENT_CHAT_ID: &str = "currentChatId";
    pub const API_BASE: &str = "API_BASE";
}

/// A write in a batch: `Some` sets the key, `None` removes it.
pub type Entry<'a> = (&'a str, Option<&'a str>);

/// String key-value storage that survives process restarts.
pub trait KeyValueStore: Send + Sync {
    /// Read a key. Empty values read as `None`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Apply several writes as one durable update.
    fn apply(&self, entries: &[Entry<'_>]) -> Result<(), StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.apply(&[(key, Some(value))])
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.apply(&[(key, None)])
    }
}

fn apply_to(map: &mut BTreeMap<String, String>, entries: &[Entry<'_>]) {
    for (key, value) in entries {
        match value {
            Some(v) if !v.is_empty() => {
                map.insert(key.to_string(), v.to_string());
            }
            _ => {
                map.remove(*key);
            }
        }
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.values
            .lock()
            .map_err(|_| StorageError::Io("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).filter(|v| !v.is_empty()).cloned())
    }

    fn apply(&self, entries: &[Entry<'_>]) -> Result<(), StorageError> {
        apply_to(&mut *self.lock()?, entries);
        Ok(())
    }
}

/// JSON-file backed store.
///
/// The whole map is rewritten on every mutation through a uniquely named
/// temporary file in the same directory, persisted over the target and
/// followed by a directory sync. A crash leaves either the old or the new
/// contents.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at the platform default location
    pub fn open_default() -> Result<Self, StorageError> {
        Self::open(Self::default_path())
    }

    /// Returns the platform-specific path for the client state file.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("xffeed");
        path.push("client_state.json");
        path
    }

    /// Open a store at `path`, creating parent directories as needed.
    ///
    /// A file that cannot be parsed is logged and treated as empty; the next
    /// write replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let values = match Self::read_file(&path) {
            Ok(values) => values,
            Err(StorageError::Corrupt(reason)) => {
                tracing::warn!(path = %path.display(), "Discarding corrupt client state: {}", reason);
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        Ok(Self { path, values: Mutex::new(values) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read_to_string(path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_file(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(values)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&json)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| StorageError::from(e.error))?;
        sync_dir(dir)
    }
}

/// Make a rename inside `dir` durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), StorageError> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), StorageError> {
    Ok(())
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self
            .values
            .lock()
            .map_err(|_| StorageError::Io("file store lock poisoned".to_string()))?;
        Ok(values.get(key).filter(|v| !v.is_empty()).cloned())
    }

    fn apply(&self, entries: &[Entry<'_>]) -> Result<(), StorageError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| StorageError::Io("file store lock poisoned".to_string()))?;
        let mut next = values.clone();
        apply_to(&mut next, entries);
        self.write_file(&next)?;
        *values = next;
        Ok(())
    }
}
