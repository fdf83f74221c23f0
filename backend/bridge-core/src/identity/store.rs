use crate::error::identity::IdentityError;

use common::ErrorLocation;

use std::collections::BTreeMap;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info};

const STORE_FILE_NAME: &str = "storage.json";
const APP_DIR_NAME: &str = "hwlink";

/// Minimal persisted key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, IdentityError>;
    fn set(&self, key: &str, value: &str) -> Result<(), IdentityError>;
}

/// JSON object file, rewritten atomically on every `set`.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(STORE_FILE_NAME),
        }
    }

    /// Store in `{platform local data dir}/hwlink/storage.json`.
    #[track_caller]
    pub fn in_data_dir() -> Result<Self, IdentityError> {
        let dir = dirs::data_local_dir().ok_or_else(|| IdentityError::Location {
            message: "Platform has no local data directory".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        Ok(Self::new(&dir.join(APP_DIR_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, IdentityError> {
        if !self.path.exists() {
            debug!("Store file {} does not exist yet", self.path.display());
            return Ok(BTreeMap::new());
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|e| IdentityError::Read {
            message: e.to_string(),
            path: self.path.clone(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        serde_json::from_str(&contents).map_err(|e| IdentityError::Read {
            message: format!("Invalid store JSON: {e}"),
            path: self.path.clone(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), IdentityError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| IdentityError::Write {
                message: e.to_string(),
                path: dir.to_path_buf(),
                location: ErrorLocation::from(Location::caller()),
            })?;
        }

        let json = serde_json::to_string_pretty(entries).map_err(|e| IdentityError::Write {
            message: e.to_string(),
            path: self.path.clone(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let temp_path = self.path.with_extension("json.tmp");

        std::fs::write(&temp_path, json).map_err(|e| IdentityError::Write {
            message: e.to_string(),
            path: temp_path.clone(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        std::fs::rename(&temp_path, &self.path).map_err(|e| IdentityError::Write {
            message: e.to_string(),
            path: self.path.clone(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!("Store saved to {}", self.path.display());
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, IdentityError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), IdentityError> {
        // A corrupt file is replaced rather than blocking the write.
        let mut entries = self.read_all().unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }
}

/// Process-local store, used when nothing should touch the disk.
#[derive(Default)]
pub struct MemoryStore {
    pub(crate) entries: Mutex<BTreeMap<String, String>>,
}

/// Path reported in errors from a [`MemoryStore`].
const MEMORY_STORE_PATH: &str = ":memory:";

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    #[track_caller]
    fn get(&self, key: &str) -> Result<Option<String>, IdentityError> {
        let entries = self.entries.lock().map_err(|e| IdentityError::Read {
            message: format!("Store lock poisoned: {e}"),
            path: PathBuf::from(MEMORY_STORE_PATH),
            location: ErrorLocation::from(Location::caller()),
        })?;
        Ok(entries.get(key).cloned())
    }

    #[track_caller]
    fn set(&self, key: &str, value: &str) -> Result<(), IdentityError> {
        let mut entries = self.entries.lock().map_err(|e| IdentityError::Write {
            message: format!("Store lock poisoned: {e}"),
            path: PathBuf::from(MEMORY_STORE_PATH),
            location: ErrorLocation::from(Location::caller()),
        })?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
