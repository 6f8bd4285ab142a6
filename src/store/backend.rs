use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use super::StoreError;

/// Minimal key-value persistence used by [`DocumentStore`](super::DocumentStore).
///
/// Implementations are only ever called with keys that passed
/// [`validate_key`].
pub trait Backend: Send + Sync {
    /// Writes `bytes` under `key`, replacing any previous value.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Reads the value stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing is stored there.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Removes `key`. Removing a missing key is an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Lists every stored key.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Human-readable location of `key`, used in error messages.
    fn location(&self, key: &str) -> String;
}

/// Rejects keys that are unusable as file names.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..")
        || key.starts_with('.')
    {
        return Err(StoreError::Invalid(format!("Invalid configuration ID: '{}'", key)));
    }
    Ok(())
}

/// One file per key in a single directory, named `<key>.<extension>`.
#[derive(Debug, Clone)]
pub struct DirBackend {
    dir: PathBuf,
    extension: &'static str,
}

impl DirBackend {
    pub const DEFAULT_EXTENSION: &'static str = "yaml";

    /// Creates a backend over `dir` using `.yaml` files.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: Self::DEFAULT_EXTENSION,
        }
    }

    /// Returns the full path for a key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, self.extension))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}.tmp", key, self.extension))
    }
}

impl Backend for DirBackend {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path(key);
        let temp_path = self.temp_path(key);

        let written = File::create(&temp_path).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::io(temp_path, e));
        }

        // Rename over the final path so readers never see a partial file
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::io(path, e));
        }

        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path(key);

        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path(key);
        fs::remove_file(&path).map_err(|e| StoreError::io(path, e))
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(self.extension) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_key(stem).is_ok() {
                    keys.push(stem.to_string());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn location(&self, key: &str) -> String {
        self.path(key).display().to_string()
    }
}

/// Backend that keeps values in memory only.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Backend for MemoryBackend {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.entries().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.entries().remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::io(
                self.location(key),
                io::Error::from(io::ErrorKind::NotFound),
            )),
        }
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.entries().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn location(&self, key: &str) -> String {
        format!("memory:{}", key)
    }
}
