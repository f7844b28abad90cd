//! Key-value storage backends.
//!
//! `KeyValueStore` is the seam between the session layer and whatever actually holds
//! the bytes: a per-window transient map, a host-wide in-memory map shared by several
//! windows, or a JSON file on disk shared by several processes.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is unavailable in this context")]
    Unavailable,
    #[error("storage quota exceeded ({limit} entries)")]
    QuotaExceeded { limit: usize },
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage lock failed for {path}: {source}")]
    Lock { path: PathBuf, source: std::io::Error },
    #[error("storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl StorageError {
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Unavailable => "storage_unavailable",
            StorageError::QuotaExceeded { .. } => "storage_quota_exceeded",
            StorageError::Io(_) => "storage_io",
            StorageError::Lock { .. } => "storage_lock",
            StorageError::Corrupt(_) => "storage_corrupt",
        }
    }
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// In-memory store. Clones share the same map, so one `MemoryStore` handed to two
/// windows behaves like host-wide persistent storage.
#[derive(Clone, Default)]
pub struct MemoryStore {
    map: Arc<RwLock<HashMap<String, String>>>,
    /// Maximum number of distinct keys; `None` means unbounded.
    quota: Option<usize>,
    disabled: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_quota(limit: usize) -> Self {
        Self { quota: Some(limit), ..Self::default() }
    }

    /// Simulate storage being switched off (every call fails with `Unavailable`).
    pub fn set_disabled(&self, disabled: bool) { self.disabled.store(disabled, Ordering::SeqCst); }

    pub fn len(&self) -> usize { self.map.read().len() }
    pub fn is_empty(&self) -> bool { self.map.read().is_empty() }

    fn check_enabled(&self) -> Result<(), StorageError> {
        if self.disabled.load(Ordering::SeqCst) { Err(StorageError::Unavailable) } else { Ok(()) }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_enabled()?;
        Ok(self.map.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_enabled()?;
        let mut w = self.map.write();
        if let Some(limit) = self.quota {
            if !w.contains_key(key) && w.len() >= limit {
                return Err(StorageError::QuotaExceeded { limit });
            }
        }
        w.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_enabled()?;
        self.map.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.check_enabled()?;
        Ok(self.map.read().keys().cloned().collect())
    }
}

/// JSON-object file on disk. Every operation re-reads the file so that several
/// processes sharing the path observe each other's writes. Each read-modify-write
/// holds an exclusive advisory lock on `<file>.lock`, and saves go through a unique
/// temp file in the same directory that is then renamed over the target.
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock: Mutex<()>,
}

/// Held for the duration of one store operation; the advisory lock is released
/// when the file handle closes.
struct FileLock(File);

impl Drop for FileLock {
    fn drop(&mut self) { let _ = FileExt::unlock(&self.0); }
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() { fs::create_dir_all(dir)?; }
        }
        let mut lock_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Ok(Self { path, lock_path, lock: Mutex::new(()) })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn lock_file(&self) -> Result<FileLock, StorageError> {
        let lock_err = |source| StorageError::Lock { path: self.lock_path.clone(), source };
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(lock_err)?;
        FileExt::lock_exclusive(&file).map_err(lock_err)?;
        Ok(FileLock(file))
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(map)?)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;
        debug!(target: "session", path = %self.path.display(), entries = map.len(), "file store saved");
        Ok(())
    }

    /// Run `f` against the current map under both the in-process and the
    /// cross-process lock, saving when it reports a change.
    fn update<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> (T, bool)) -> Result<T, StorageError> {
        let _g = self.lock.lock();
        let _file = self.lock_file()?;
        let mut map = self.load()?;
        let (out, changed) = f(&mut map);
        if changed { self.save(&map)?; }
        Ok(out)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.update(|map| (map.get(key).cloned(), false))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
            ((), true)
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|map| ((), map.remove(key).is_some()))
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.update(|map| (map.keys().cloned().collect(), false))
    }
}

#[cfg(test)]
#[path = "kv_tests.rs"]
mod kv_tests;
