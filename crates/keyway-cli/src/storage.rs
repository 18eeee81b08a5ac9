//! JSON-file storage.
//!
//! The whole map is read and rewritten on every access. Invocations are
//! short-lived and sequential, so there is no locking.

use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use keyway_core::{Storage, StorageError};

/// [`Storage`] backed by a single JSON object on disk.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Storage at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self, operation: &'static str, key: &str) -> Result<BTreeMap<String, String>, StorageError> {
        let fail = |reason: String| StorageError { operation, key: key.to_string(), reason };

        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(fail(err.to_string())),
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|err| fail(err.to_string()))
    }

    fn save(
        &self,
        operation: &'static str,
        key: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<(), StorageError> {
        let fail = |reason: String| StorageError { operation, key: key.to_string(), reason };

        let text = serde_json::to_string_pretty(values).map_err(|err| fail(err.to_string()))?;
        fs::write(&self.path, text).map_err(|err| fail(err.to_string()))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load("get", key)?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.load("set", key)?;
        values.insert(key.to_string(), value.to_string());
        self.save("set", key, &values)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.load("remove", key)?;
        if values.remove(key).is_some() {
            self.save("remove", key, &values)?;
        }
        Ok(())
    }
}
