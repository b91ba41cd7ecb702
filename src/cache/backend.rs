//! Byte stores that persist cache blobs.
//!
//! The cache layer only depends on [`ByteStore`]; the directory store is the production backend and
//! the memory store serves embedded use and tests.

use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::backend";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache storage unavailable at {location}: {reason}")]
    Unavailable { location: String, reason: String },
    #[error("cache storage io error: {0}")]
    Io(#[from] io::Error),
    #[error("cached blob `{name}` is corrupt: {source}")]
    Corrupt {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid blob name `{0}`")]
    InvalidName(String),
}

impl StoreError {
    pub fn unavailable(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable label used in structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "store_unavailable",
            Self::Io(_) => "store_io",
            Self::Corrupt { .. } => "cache_corrupt",
            Self::InvalidName(_) => "invalid_name",
        }
    }
}

/// Durable key-value storage for serialized cache entries.
pub trait ByteStore: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the blob stored under `name`. Readers observe either the old or the new blob, never a
    /// mixture.
    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Returns `true` when a blob existed and was removed.
    fn remove(&self, name: &str) -> Result<bool, StoreError>;

    fn list_all(&self) -> Result<Vec<String>, StoreError>;

    /// Human-readable location for log lines.
    fn location(&self) -> String;
}

impl<S: ByteStore + ?Sized> ByteStore for std::sync::Arc<S> {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(name)
    }

    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        (**self).put(name, bytes)
    }

    fn remove(&self, name: &str) -> Result<bool, StoreError> {
        (**self).remove(name)
    }

    fn list_all(&self) -> Result<Vec<String>, StoreError> {
        (**self).list_all()
    }

    fn location(&self) -> String {
        (**self).location()
    }
}

// ============================================================================
// Directory store
// ============================================================================

/// Stores each blob as a file inside one cache directory.
///
/// The directory is never created implicitly on read; a missing directory reports
/// [`StoreError::Unavailable`] so callers can fall back to live execution.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Use an existing directory. It is not checked until first use.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use `root`, creating it (and parents) first.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(StoreError::unavailable(
                self.location(),
                "cache directory does not exist",
            ))
        }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, StoreError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(name)),
            _ => Err(StoreError::InvalidName(name.to_string())),
        }
    }
}

impl ByteStore for DirectoryStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.resolve(name)?;
        self.ensure_available()?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.resolve(name)?;
        self.ensure_available()?;

        let mut staged = tempfile::Builder::new()
            .prefix(".staging-")
            .tempfile_in(&self.root)?;
        staged.write_all(bytes)?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|err| StoreError::Io(err.error))?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.resolve(name)?;
        self.ensure_available()?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn list_all(&self) -> Result<Vec<String>, StoreError> {
        self.ensure_available()?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

// ============================================================================
// Memory store
// ============================================================================

/// Process-local store. Blobs are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the backing medium. While offline every call reports `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored blobs, regardless of availability.
    pub fn len(&self) -> usize {
        rw_read(&self.blobs, SOURCE, "memory.len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::unavailable(self.location(), "store is offline"))
        } else {
            Ok(())
        }
    }
}

impl ByteStore for MemoryStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_available()?;
        Ok(rw_read(&self.blobs, SOURCE, "memory.get").get(name).cloned())
    }

    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.ensure_available()?;
        rw_write(&self.blobs, SOURCE, "memory.put").insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<bool, StoreError> {
        self.ensure_available()?;
        Ok(rw_write(&self.blobs, SOURCE, "memory.remove")
            .remove(name)
            .is_some())
    }

    fn list_all(&self) -> Result<Vec<String>, StoreError> {
        self.ensure_available()?;
        let mut names: Vec<String> = rw_read(&self.blobs, SOURCE, "memory.list_all")
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn directory_store_roundtrip() {
        let dir = TempDir::new().expect("temp dir");
        let store = DirectoryStore::open(dir.path());

        assert!(store.get("a.json").expect("get").is_none());
        store.put("a.json", b"first").expect("put");
        store.put("a.json", b"second").expect("overwrite");
        assert_eq!(store.get("a.json").expect("get"), Some(b"second".to_vec()));
        assert_eq!(store.list_all().expect("list"), vec!["a.json".to_string()]);

        assert!(store.remove("a.json").expect("remove"));
        assert!(!store.remove("a.json").expect("remove again"));
        assert!(store.list_all().expect("list").is_empty());
    }

    #[test]
    fn directory_store_leaves_no_staging_files() {
        let dir = TempDir::new().expect("temp dir");
        let store = DirectoryStore::open(dir.path());
        for round in 0..5 {
            store
                .put("k.json", format!("payload-{round}").as_bytes())
                .expect("put");
        }
        assert_eq!(store.list_all().expect("list"), vec!["k.json".to_string()]);
    }

    #[test]
    fn missing_directory_is_unavailable() {
        let dir = TempDir::new().expect("temp dir");
        let store = DirectoryStore::open(dir.path().join("sql-cache"));

        assert!(matches!(
            store.get("a.json"),
            Err(StoreError::Unavailable { .. })
        ));
        assert!(matches!(
            store.put("a.json", b"x"),
            Err(StoreError::Unavailable { .. })
        ));
        assert!(matches!(store.list_all(), Err(StoreError::Unavailable { .. })));
    }

    #[test]
    fn create_makes_directory() {
        let dir = TempDir::new().expect("temp dir");
        let root = dir.path().join("nested").join("sql-cache");
        let store = DirectoryStore::create(&root).expect("create");
        assert!(root.is_dir());
        store.put("a.json", b"x").expect("put");
    }

    #[test]
    fn rejects_path_traversal_names() {
        let dir = TempDir::new().expect("temp dir");
        let store = DirectoryStore::open(dir.path());
        for name in ["../escape.json", "nested/a.json", "/abs.json", ""] {
            assert!(
                matches!(store.put(name, b"x"), Err(StoreError::InvalidName(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn memory_store_offline_reports_unavailable() {
        let store = MemoryStore::new();
        store.put("a", b"x").expect("put");
        store.set_offline(true);
        assert!(matches!(store.get("a"), Err(StoreError::Unavailable { .. })));
        assert_eq!(store.len(), 1);
        store.set_offline(false);
        assert_eq!(store.get("a").expect("get"), Some(b"x".to_vec()));
    }

    #[test]
    fn memory_store_recovers_from_poisoned_lock() {
        let store = MemoryStore::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.blobs.write().expect("blobs lock should be acquired");
            panic!("poison blobs lock");
        }));

        store.put("a", b"x").expect("put after poison");
        assert_eq!(store.get("a").expect("get"), Some(b"x".to_vec()));
    }
}
