use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use axum::body::Bytes;

/// StorageService
///
/// Contract for the upload store. Keys are relative paths such as
/// `articles/article_<id>.jpg`; the same keys are served under `/uploads/`.
/// Swapping the implementation (disk in the server, mock in tests) leaves the
/// upload and delete handlers untouched.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the storage root. Safe to call at every startup.
    async fn ensure_root(&self) -> Result<(), String>;

    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), String>;

    /// Returns `Ok(false)` when there was nothing to delete.
    async fn delete_object(&self, key: &str) -> Result<bool, String>;
}

/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a key can never leave the storage
/// root.
pub fn sanitize_key(key: &str) -> String {
    key.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// LocalDiskStorage
///
/// Stores uploads as plain files below a root directory (the same directory
/// `/uploads` is served from).
#[derive(Clone)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, String> {
        let key = sanitize_key(key);
        if key.is_empty() {
            return Err("empty storage key".to_string());
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn ensure_root(&self) -> Result<(), String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| format!("create {}: {e}", self.root.display()))
    }

    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<(), String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("create {}: {e}", parent.display()))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| format!("write {}: {e}", path.display()))
    }

    async fn delete_object(&self, key: &str) -> Result<bool, String> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(format!("remove {}: {e}", path.display())),
        }
    }
}

/// MockStorageService
///
/// Test double that records every key it is asked to store or delete.
/// `new_failing()` makes every operation return an error while still
/// recording the attempt.
#[derive(Default)]
pub struct MockStorageService {
    pub should_fail: bool,
    stored: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn stored_keys(&self) -> Vec<String> {
        self.stored.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_root(&self) -> Result<(), String> {
        Ok(())
    }

    async fn put_object(&self, key: &str, _bytes: Bytes) -> Result<(), String> {
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sanitize_key(key));
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<bool, String> {
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sanitize_key(key));
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }
        Ok(true)
    }
}

/// StorageState
///
/// The shared handle to the upload store.
pub type StorageState = Arc<dyn StorageService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_key_strips_traversal() {
        assert_eq!(sanitize_key("../../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_key("articles/./a.jpg"), "articles/a.jpg");
        assert_eq!(sanitize_key("..\\..\\boot.ini"), "boot.ini");
    }
}
