//! Output snapshot reported back to the orchestrator
//!
//! The reporter takes the saver's finalized records, deep-copies them into
//! a schema-stamped snapshot, and serializes the snapshot to JSON. The
//! copy is independent in both directions: neither later changes to the
//! saver's records nor changes to the snapshot leak across. Serialization
//! failures are fatal to the reporting call and surface to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::descriptor::ArtifactDescriptor;

/// Schema version for the outputs snapshot
pub const OUTPUTS_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for the outputs snapshot
pub const OUTPUTS_SCHEMA_ID: &str = "step-outbox/outputs@1";

/// Errors for snapshot serialization and file IO
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Finalized artifact records for one step, ready to report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSnapshot {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When the snapshot was created
    pub created_at: DateTime<Utc>,

    /// Finalized artifact records, in declaration order
    pub artifacts: Vec<ArtifactDescriptor>,
}

impl OutputSnapshot {
    /// Build a snapshot from the saver's finalized records
    ///
    /// The records are deep-copied: the snapshot owns its data and shares
    /// nothing with the slice it was built from.
    pub fn new(records: &[ArtifactDescriptor]) -> Self {
        Self {
            schema_version: OUTPUTS_SCHEMA_VERSION,
            schema_id: OUTPUTS_SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            artifacts: records.to_vec(),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write atomically to file (write-then-rename)
    pub fn write_to_file(&self, path: &Path) -> Result<(), ReportError> {
        let json = self.to_json()?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &json)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Load from file
    pub fn from_file(path: &Path) -> Result<Self, ReportError> {
        let json = fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ArchiveStrategy, StorageLocation};
    use std::path::Path;

    fn sample_records() -> Vec<ArtifactDescriptor> {
        vec![
            ArtifactDescriptor::new("test-report")
                .with_local_path(Path::new("/tmp/outputs/report"))
                .with_preview_path("index.html")
                .with_storage_location(StorageLocation::new("test-bucket", "test-workflow/test-report")),
            ArtifactDescriptor::new("coverage")
                .with_local_path(Path::new("/tmp/outputs/coverage"))
                .with_archive_strategy(ArchiveStrategy::TarGzip)
                .with_storage_location(StorageLocation::new("test-bucket", "test-workflow/coverage.tgz")),
        ]
    }

    #[test]
    fn test_snapshot_schema_stamp() {
        let snapshot = OutputSnapshot::new(&sample_records());

        assert_eq!(snapshot.schema_version, 1);
        assert_eq!(snapshot.schema_id, "step-outbox/outputs@1");
        assert_eq!(snapshot.artifacts.len(), 2);
    }

    #[test]
    fn test_snapshot_is_independent_of_source() {
        let mut records = sample_records();
        let snapshot = OutputSnapshot::new(&records);

        records[0].preview_path = Some("changed.html".to_string());
        records[0].storage_location = None;

        assert_eq!(
            snapshot.artifacts[0].preview_path,
            Some("index.html".to_string())
        );
        assert!(snapshot.artifacts[0].is_finalized());
    }

    #[test]
    fn test_source_is_independent_of_snapshot() {
        let records = sample_records();
        let mut snapshot = OutputSnapshot::new(&records);

        snapshot.artifacts[1].name = "renamed".to_string();
        snapshot.artifacts.remove(0);

        assert_eq!(records[0].name, "test-report");
        assert_eq!(records[1].name, "coverage");
    }

    #[test]
    fn test_serialization_uses_wire_fields() {
        let snapshot = OutputSnapshot::new(&sample_records());
        let json = snapshot.to_json().unwrap();

        assert!(json.contains(r#""schema_id": "step-outbox/outputs@1""#));
        assert!(json.contains(r#""previewPath": "index.html""#));
        assert!(json.contains(r#""archive": "tar-gzip""#));
        assert!(json.contains(r#""bucket": "test-bucket""#));
    }

    #[test]
    fn test_round_trip() {
        let snapshot = OutputSnapshot::new(&sample_records());

        let json = snapshot.to_json().unwrap();
        let parsed = OutputSnapshot::from_json(&json).unwrap();

        assert_eq!(parsed.schema_version, snapshot.schema_version);
        assert_eq!(parsed.schema_id, snapshot.schema_id);
        assert_eq!(parsed.created_at, snapshot.created_at);
        assert_eq!(parsed.artifacts, snapshot.artifacts);
    }

    #[test]
    fn test_preview_path_survives_round_trip_byte_for_byte() {
        let odd_preview = "./nested dir/../index file.html#fragment?x=1";
        let records = vec![ArtifactDescriptor::new("odd")
            .with_preview_path(odd_preview)
            .with_storage_location(StorageLocation::new("b", "k"))];
        let snapshot = OutputSnapshot::new(&records);

        let parsed = OutputSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();

        assert_eq!(parsed.artifacts[0].preview_path.as_deref(), Some(odd_preview));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = OutputSnapshot::new(&[]);
        let json = snapshot.to_json().unwrap();

        assert!(json.contains(r#""artifacts": []"#));

        let parsed = OutputSnapshot::from_json(&json).unwrap();
        assert!(parsed.artifacts.is_empty());
    }

    #[test]
    fn test_write_and_read_file() {
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let snapshot = OutputSnapshot::new(&sample_records());

        let path = dir.path().join("outputs.json");
        snapshot.write_to_file(&path).unwrap();

        let loaded = OutputSnapshot::from_file(&path).unwrap();
        assert_eq!(loaded.artifacts, snapshot.artifacts);
        assert_eq!(loaded.schema_id, snapshot.schema_id);
    }
}
