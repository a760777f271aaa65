//! Output artifact descriptors and their wire schema
//!
//! One record type serves the whole pipeline: the step template declares
//! the artifact, the saver fills in the storage location, and the reporter
//! serializes the finalized record back to the orchestrator. The wire form
//! is a flat JSON object per artifact with the keys `name`, `path`,
//! `previewPath`, `archive`, `bucket`, `key`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How an artifact's content is packaged before upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveStrategy {
    /// Pass-through (default): upload the file or directory as-is
    #[default]
    None,
    /// Pack into a single gzip-compressed tarball
    TarGzip,
    /// Pack into a single zip file
    Zip,
}

impl ArchiveStrategy {
    /// True when no archive step runs for this strategy
    pub fn is_pass_through(&self) -> bool {
        matches!(self, ArchiveStrategy::None)
    }

    /// File extension of the staged archive ("" for pass-through)
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveStrategy::None => "",
            ArchiveStrategy::TarGzip => ".tgz",
            ArchiveStrategy::Zip => ".zip",
        }
    }
}

impl std::fmt::Display for ArchiveStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveStrategy::None => write!(f, "none"),
            ArchiveStrategy::TarGzip => write!(f, "tar-gzip"),
            ArchiveStrategy::Zip => write!(f, "zip"),
        }
    }
}

/// Remote object-store coordinates for a finalized artifact
///
/// Opaque to the pipeline once set: nothing here parses or rewrites keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    /// Target bucket
    pub bucket: String,

    /// Object key within the bucket
    pub key: String,
}

impl StorageLocation {
    /// Create a storage location
    pub fn new(bucket: &str, key: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

/// A step's declared output artifact
///
/// `name` and `local_path` are fixed at declaration time. `preview_path`
/// is opaque viewer metadata: never validated against the content, never
/// derived, never rewritten by any pipeline stage. `storage_location` is
/// absent until the artifact is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Artifact name, unique within the step
    pub name: String,

    /// Path on the step's local volume where the content lives
    #[serde(rename = "path", skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,

    /// Relative path inside the artifact shown by viewers
    #[serde(rename = "previewPath", skip_serializing_if = "Option::is_none")]
    pub preview_path: Option<String>,

    /// Packaging applied before upload
    #[serde(
        rename = "archive",
        default,
        skip_serializing_if = "ArchiveStrategy::is_pass_through"
    )]
    pub archive_strategy: ArchiveStrategy,

    /// Remote location, present once finalized
    #[serde(flatten)]
    pub storage_location: Option<StorageLocation>,
}

impl ArtifactDescriptor {
    /// Create a descriptor with just a name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            local_path: None,
            preview_path: None,
            archive_strategy: ArchiveStrategy::None,
            storage_location: None,
        }
    }

    /// Set the local path
    pub fn with_local_path(mut self, path: &Path) -> Self {
        self.local_path = Some(path.to_path_buf());
        self
    }

    /// Set the preview path
    pub fn with_preview_path(mut self, preview: &str) -> Self {
        self.preview_path = Some(preview.to_string());
        self
    }

    /// Set the archive strategy
    pub fn with_archive_strategy(mut self, strategy: ArchiveStrategy) -> Self {
        self.archive_strategy = strategy;
        self
    }

    /// Set the storage location
    pub fn with_storage_location(mut self, location: StorageLocation) -> Self {
        self.storage_location = Some(location);
        self
    }

    /// True once a storage location has been assigned
    pub fn is_finalized(&self) -> bool {
        self.storage_location.is_some()
    }
}
