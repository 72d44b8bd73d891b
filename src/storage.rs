use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, RwLock},
};

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("value of {key:?} has version {found}, newest supported is {supported}")]
    UnsupportedVersion {
        key: String,
        found: u32,
        supported: u32,
    },

    #[error("value of {key:?} is corrupted: {reason}")]
    Corrupted { key: String, reason: String },

    #[error("store is unavailable: {0}")]
    Unavailable(String),
}

/// Whole-value key-value store holding the top-level records
/// (`data`, `tagsCountMap`, `browsingPatterns`, `customLabels`).
///
/// Missing keys are simply absent from the returned map.
pub trait KvStore: Send + Sync {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError>;
    fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError>;
}

/// One json file per key inside the data directory.
#[derive(Clone)]
pub struct BackendLocal {
    pub base_dir: PathBuf,
}

impl BackendLocal {
    pub fn new(storage_dir: &str) -> std::io::Result<Self> {
        let path = PathBuf::from(storage_dir);
        std::fs::create_dir_all(&path)?;
        Ok(BackendLocal { base_dir: path })
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }

    pub fn exists(&self, key: &str) -> bool {
        std::fs::metadata(self.path_of(key)).is_ok()
    }

    fn write(&self, key: &str, data: &[u8]) -> std::io::Result<()> {
        let path = self.path_of(key);
        let temp_path = self
            .base_dir
            .join(format!("{}-{key}.json.tmp", rusty_ulid::generate_ulid_string()));

        if let Err(err) = std::fs::write(&temp_path, data) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(err);
        }

        std::fs::rename(&temp_path, &path)
    }
}

impl KvStore for BackendLocal {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let mut output = HashMap::new();

        for key in keys {
            let data = match std::fs::read(self.path_of(key)) {
                Ok(data) => data,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };

            match serde_json::from_slice::<Value>(&data) {
                Ok(value) => {
                    output.insert(key.to_string(), value);
                }
                Err(err) => {
                    return Err(StoreError::Corrupted {
                        key: key.to_string(),
                        reason: err.to_string(),
                    })
                }
            }
        }

        Ok(output)
    }

    fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        for (key, value) in entries {
            let data = serde_json::to_vec(&value)?;
            self.write(&key, &data)?;
        }
        Ok(())
    }
}

/// In-process store, used by tests and as a scratch backend.
#[derive(Clone, Default)]
pub struct BackendMemory {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl BackendMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for BackendMemory {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let values = self
            .values
            .read()
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        Ok(keys
            .iter()
            .filter_map(|key| values.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        let mut values = self
            .values
            .write()
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        values.extend(entries);
        Ok(())
    }
}
