//! Remote store seam
//!
//! The pipeline never talks to object storage itself. `StoreClient` is the
//! narrow interface the embedding executor implements with its real
//! client; the saver drives save-then-upload through it. The in-memory
//! client backs tests and supports failure injection for the skip paths.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use crate::descriptor::StorageLocation;

/// Errors from a store client
#[derive(Debug, Error)]
pub enum StoreError {
    /// Upload was refused or failed remotely
    #[error("upload to {bucket}/{key} failed: {reason}")]
    UploadFailed {
        bucket: String,
        key: String,
        reason: String,
    },

    /// Local read of the upload source failed
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Narrow interface to the remote object store
pub trait StoreClient {
    /// Upload the file or directory at `source` to `location`
    fn put(&self, source: &Path, location: &StorageLocation) -> Result<(), StoreError>;
}

/// An upload recorded by the in-memory client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Where the object was put
    pub location: StorageLocation,
    /// The path the upload read from
    pub source: PathBuf,
    /// Source size in bytes (0 for directories)
    pub size_bytes: u64,
}

/// In-memory store client for tests
///
/// Records every successful `put` and can be told to fail specific keys.
#[derive(Debug, Default)]
pub struct MemoryStoreClient {
    objects: Mutex<Vec<StoredObject>>,
    fail_keys: HashSet<String>,
}

impl MemoryStoreClient {
    /// Create an empty client
    pub fn new() -> Self {
        Self::default()
    }

    /// Make uploads to the given key fail
    pub fn with_failure_on(mut self, key: &str) -> Self {
        self.fail_keys.insert(key.to_string());
        self
    }

    /// Snapshot of the uploads recorded so far
    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Number of uploads recorded so far
    pub fn object_count(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }
}

impl StoreClient for MemoryStoreClient {
    fn put(&self, source: &Path, location: &StorageLocation) -> Result<(), StoreError> {
        if self.fail_keys.contains(&location.key) {
            return Err(StoreError::UploadFailed {
                bucket: location.bucket.clone(),
                key: location.key.clone(),
                reason: "injected failure".to_string(),
            });
        }

        // The source has to exist at upload time, same as a real client.
        let metadata = fs::metadata(source)?;
        let size_bytes = if metadata.is_file() { metadata.len() } else { 0 };

        if let Ok(mut objects) = self.objects.lock() {
            objects.push(StoredObject {
                location: location.clone(),
                source: source.to_path_buf(),
                size_bytes,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_memory_client_records_put() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("artifact.tgz");
        File::create(&source).unwrap().write_all(b"bytes").unwrap();

        let client = MemoryStoreClient::new();
        let location = StorageLocation::new("test-bucket", "test-key/artifact.tgz");

        client.put(&source, &location).unwrap();

        let objects = client.objects();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].location, location);
        assert_eq!(objects[0].source, source);
        assert_eq!(objects[0].size_bytes, 5);
    }

    #[test]
    fn test_memory_client_injected_failure() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("artifact.tgz");
        File::create(&source).unwrap();

        let client = MemoryStoreClient::new().with_failure_on("bad/key");

        let result = client.put(&source, &StorageLocation::new("b", "bad/key"));

        match result {
            Err(StoreError::UploadFailed { bucket, key, .. }) => {
                assert_eq!(bucket, "b");
                assert_eq!(key, "bad/key");
            }
            other => panic!("expected UploadFailed error, got {:?}", other),
        }
        assert_eq!(client.object_count(), 0);
    }

    #[test]
    fn test_memory_client_missing_source_errors() {
        let client = MemoryStoreClient::new();

        let result = client.put(
            Path::new("/no/such/source"),
            &StorageLocation::new("b", "k"),
        );

        assert!(matches!(result, Err(StoreError::IoError(_))));
    }

    #[test]
    fn test_memory_client_directory_source() {
        let dir = TempDir::new().unwrap();
        let client = MemoryStoreClient::new();

        client
            .put(dir.path(), &StorageLocation::new("b", "k/dir"))
            .unwrap();

        let objects = client.objects();
        assert_eq!(objects[0].size_bytes, 0);
        assert_eq!(objects[0].source, dir.path());
    }
}
