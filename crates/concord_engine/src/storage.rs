//! Blob storage for uploaded contract documents.
//!
//! The engine never touches paths directly; it hands bytes to a
//! [`FileStore`] and keeps the returned [`FileRef`].

use async_trait::async_trait;
use concord_ids::FileRef;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(FileRef),

    #[error("I/O error on {file_ref}: {source}")]
    Io {
        file_ref: String,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    fn io(file_ref: impl Into<String>, source: io::Error) -> Self {
        StorageError::Io {
            file_ref: file_ref.into(),
            source,
        }
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Capability for persisting and reading document blobs.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store `bytes` under a freshly generated reference that keeps the
    /// extension of `original_name`.
    async fn save(&self, original_name: &str, bytes: &[u8]) -> StorageResult<FileRef>;

    async fn retrieve(&self, file_ref: &FileRef) -> StorageResult<Vec<u8>>;

    async fn exists(&self, file_ref: &FileRef) -> StorageResult<bool>;

    /// Remove a blob. Removing an absent blob is not an error.
    async fn delete(&self, file_ref: &FileRef) -> StorageResult<()>;
}

// ============================================================================
// Local directory
// ============================================================================

/// Blobs as flat files in one directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, file_ref: &FileRef) -> PathBuf {
        self.root.join(file_ref.as_str())
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, original_name: &str, bytes: &[u8]) -> StorageResult<FileRef> {
        let file_ref = FileRef::generate(original_name);
        let path = self.path_for(&file_ref);
        let partial = self.root.join(format!("{}.part", file_ref));

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::io(self.root.display().to_string(), e))?;
        tokio::fs::write(&partial, bytes)
            .await
            .map_err(|e| StorageError::io(file_ref.as_str(), e))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| StorageError::io(file_ref.as_str(), e))?;

        debug!(file_ref = %file_ref, bytes = bytes.len(), "Blob stored");
        Ok(file_ref)
    }

    async fn retrieve(&self, file_ref: &FileRef) -> StorageResult<Vec<u8>> {
        match tokio::fs::read(self.path_for(file_ref)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(file_ref.clone()))
            }
            Err(e) => Err(StorageError::io(file_ref.as_str(), e)),
        }
    }

    async fn exists(&self, file_ref: &FileRef) -> StorageResult<bool> {
        tokio::fs::try_exists(self.path_for(file_ref))
            .await
            .map_err(|e| StorageError::io(file_ref.as_str(), e))
    }

    async fn delete(&self, file_ref: &FileRef) -> StorageResult<()> {
        match tokio::fs::remove_file(self.path_for(file_ref)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(file_ref.as_str(), e)),
        }
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    blobs: RwLock<HashMap<FileRef, Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn save(&self, original_name: &str, bytes: &[u8]) -> StorageResult<FileRef> {
        let file_ref = FileRef::generate(original_name);
        self.blobs
            .write()
            .await
            .insert(file_ref.clone(), bytes.to_vec());
        Ok(file_ref)
    }

    async fn retrieve(&self, file_ref: &FileRef) -> StorageResult<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(file_ref)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(file_ref.clone()))
    }

    async fn exists(&self, file_ref: &FileRef) -> StorageResult<bool> {
        Ok(self.blobs.read().await.contains_key(file_ref))
    }

    async fn delete(&self, file_ref: &FileRef) -> StorageResult<()> {
        self.blobs.write().await.remove(file_ref);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_store_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path().join("uploads"));

        let file_ref = store.save("nda.pdf", b"%PDF-1.7").await.unwrap();
        assert!(file_ref.as_str().ends_with(".pdf"));
        assert!(store.exists(&file_ref).await.unwrap());
        assert_eq!(store.retrieve(&file_ref).await.unwrap(), b"%PDF-1.7");
        assert!(!tmp
            .path()
            .join("uploads")
            .join(format!("{}.part", file_ref))
            .exists());

        store.delete(&file_ref).await.unwrap();
        assert!(!store.exists(&file_ref).await.unwrap());
        store.delete(&file_ref).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_store_missing_blob() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path());
        let missing = FileRef::generate("gone.pdf");

        let err = store.retrieve(&missing).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryFileStore::new();
        assert!(store.is_empty().await);

        let file_ref = store.save("a.txt", b"hello").await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.retrieve(&file_ref).await.unwrap(), b"hello");

        store.delete(&file_ref).await.unwrap();
        assert!(matches!(
            store.retrieve(&file_ref).await,
            Err(StorageError::NotFound(_))
        ));
    }
}
