//! Storage location assignment for finalized artifacts
//!
//! Decides where each artifact lands in the remote store. A location the
//! descriptor already carries always wins; otherwise bucket and key derive
//! from the step's default location. Assignment is a pure field-level
//! update: nothing besides `storage_location` changes.

use crate::descriptor::{ArchiveStrategy, ArtifactDescriptor, StorageLocation};
use thiserror::Error;

/// Errors during storage location assignment
#[derive(Debug, Error)]
pub enum AssignError {
    /// Neither the descriptor nor the step supplies a location
    #[error("artifact {name}: no storage location and no step default")]
    NoLocation { name: String },

    /// The artifact name is empty, so no key can be derived
    #[error("cannot derive a storage key from an empty artifact name")]
    EmptyName,
}

/// Derive the object key for an artifact under a default key prefix
///
/// `{prefix}/{name}` plus the strategy's staged extension. Pass-through
/// artifacts keep the bare name and upload under it as-is.
pub fn derive_key(prefix: &str, name: &str, strategy: ArchiveStrategy) -> String {
    let prefix = prefix.trim_end_matches('/');
    format!("{}/{}{}", prefix, name, strategy.extension())
}

/// Assign a storage location to a descriptor
///
/// An explicit location on the descriptor always wins and is left
/// untouched, even when its key extension disagrees with the archive
/// strategy. Every field other than `storage_location` is unchanged by
/// this call.
pub fn assign_location(
    descriptor: &mut ArtifactDescriptor,
    default_location: Option<&StorageLocation>,
) -> Result<(), AssignError> {
    if descriptor.storage_location.is_some() {
        return Ok(());
    }

    if descriptor.name.is_empty() {
        return Err(AssignError::EmptyName);
    }

    let default = default_location.ok_or_else(|| AssignError::NoLocation {
        name: descriptor.name.clone(),
    })?;

    descriptor.storage_location = Some(StorageLocation {
        bucket: default.bucket.clone(),
        key: derive_key(&default.key, &descriptor.name, descriptor.archive_strategy),
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn step_default() -> StorageLocation {
        StorageLocation::new("test-bucket", "test-workflow")
    }

    #[test]
    fn test_derive_key_per_strategy() {
        assert_eq!(
            derive_key("test-workflow", "report", ArchiveStrategy::TarGzip),
            "test-workflow/report.tgz"
        );
        assert_eq!(
            derive_key("test-workflow", "report", ArchiveStrategy::Zip),
            "test-workflow/report.zip"
        );
        assert_eq!(
            derive_key("test-workflow", "report", ArchiveStrategy::None),
            "test-workflow/report"
        );
    }

    #[test]
    fn test_derive_key_trims_trailing_slash() {
        assert_eq!(
            derive_key("runs/42/", "logs", ArchiveStrategy::None),
            "runs/42/logs"
        );
    }

    #[test]
    fn test_assign_from_default() {
        let mut descriptor = ArtifactDescriptor::new("test-report")
            .with_local_path(Path::new("/tmp/outputs/report"))
            .with_archive_strategy(ArchiveStrategy::TarGzip);

        assign_location(&mut descriptor, Some(&step_default())).unwrap();

        assert_eq!(
            descriptor.storage_location,
            Some(StorageLocation::new(
                "test-bucket",
                "test-workflow/test-report.tgz"
            ))
        );
    }

    #[test]
    fn test_assign_changes_only_storage_location() {
        let original = ArtifactDescriptor::new("test-report")
            .with_local_path(Path::new("/tmp/outputs/report"))
            .with_preview_path("index.html")
            .with_archive_strategy(ArchiveStrategy::Zip);
        let mut assigned = original.clone();

        assign_location(&mut assigned, Some(&step_default())).unwrap();

        // Reverting the one assigned field must restore the exact original.
        let mut reverted = assigned.clone();
        reverted.storage_location = None;
        assert_eq!(reverted, original);
        assert!(assigned.is_finalized());
    }

    #[test]
    fn test_explicit_location_wins() {
        let mut descriptor = ArtifactDescriptor::new("a")
            .with_local_path(Path::new("/p"))
            .with_preview_path("index.html")
            .with_storage_location(StorageLocation::new("b", "k/a.tgz"));
        let before = descriptor.clone();

        assign_location(&mut descriptor, Some(&step_default())).unwrap();

        assert_eq!(descriptor, before);
        assert_eq!(
            descriptor.storage_location,
            Some(StorageLocation::new("b", "k/a.tgz"))
        );
    }

    #[test]
    fn test_explicit_location_without_default() {
        let mut descriptor =
            ArtifactDescriptor::new("a").with_storage_location(StorageLocation::new("b", "k"));

        assert!(assign_location(&mut descriptor, None).is_ok());
    }

    #[test]
    fn test_no_location_anywhere_errors() {
        let mut descriptor = ArtifactDescriptor::new("orphan");

        let result = assign_location(&mut descriptor, None);

        match result {
            Err(AssignError::NoLocation { name }) => assert_eq!(name, "orphan"),
            _ => panic!("expected NoLocation error"),
        }
        assert!(!descriptor.is_finalized());
    }

    #[test]
    fn test_empty_name_errors() {
        let mut descriptor = ArtifactDescriptor::new("");

        let result = assign_location(&mut descriptor, Some(&step_default()));

        assert!(matches!(result, Err(AssignError::EmptyName)));
    }
}
