//! Raw key-value backends
//!
//! A backend maps string keys to string values and knows nothing about
//! what the values mean. [`LocalStore`](super::LocalStore) layers the
//! typed records on top.

use crate::error::{AppError, Result};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Synchronous string key-value storage.
pub trait KeyValueBackend: Send + Sync {
    /// Read a value. `Ok(None)` when the key has never been written.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing a missing key succeeds.
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// One JSON file per key inside a directory
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Open (and create if needed) the storage directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!("Key-value storage at: {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(AppError::Validation(format!("invalid storage key: '{}'", key)));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl KeyValueBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;

        // Write to a temp file first, then rename over the old value
        let temp_path = self
            .root
            .join(format!(".{}.{}.tmp", key, Uuid::new_v4().simple()));
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        tracing::debug!("Wrote key: {} ({} bytes)", key, value.len());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory backend for tests
#[derive(Default)]
pub struct MemoryBackend {
    items: Mutex<HashMap<String, String>>,
    simulate_write_error: Mutex<bool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, for testing error paths.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        *self
            .simulate_write_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = simulate;
    }

    fn items(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writable(&self) -> Result<()> {
        let simulate = *self
            .simulate_write_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if simulate {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated write error",
            )));
        }
        Ok(())
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        self.items().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        self.items().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_backend_round_trip() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::open(temp.path().join("kv")).unwrap();

        assert_eq!(backend.get_item("notes").unwrap(), None);

        backend.set_item("notes", "[]").unwrap();
        backend.set_item("notes", r#"[{"id":"1"}]"#).unwrap();
        assert_eq!(
            backend.get_item("notes").unwrap().as_deref(),
            Some(r#"[{"id":"1"}]"#)
        );

        backend.remove_item("notes").unwrap();
        backend.remove_item("notes").unwrap();
        assert_eq!(backend.get_item("notes").unwrap(), None);
    }

    #[test]
    fn test_file_backend_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::open(temp.path()).unwrap();

        backend.set_item("classdesk_notes", "[]").unwrap();

        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["classdesk_notes.json"]);
    }

    #[test]
    fn test_file_backend_rejects_path_like_keys() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::open(temp.path()).unwrap();

        assert!(backend.set_item("../escape", "x").is_err());
        assert!(backend.get_item("a/b").is_err());
        assert!(backend.get_item("").is_err());
    }

    #[test]
    fn test_file_backend_persists_across_instances() {
        let temp = TempDir::new().unwrap();

        FileBackend::open(temp.path())
            .unwrap()
            .set_item("profile", "{}")
            .unwrap();

        let reopened = FileBackend::open(temp.path()).unwrap();
        assert_eq!(reopened.get_item("profile").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_memory_backend_simulated_write_error() {
        let backend = MemoryBackend::new();
        backend.set_item("k", "v").unwrap();

        backend.set_simulate_write_error(true);
        assert!(backend.set_item("k", "w").is_err());
        assert_eq!(backend.get_item("k").unwrap().as_deref(), Some("v"));
    }
}
