//! Artifact saver: the save pipeline for a step's declared outputs
//!
//! Runs each declared artifact through validate, archive, and location
//! assignment, and collects the finalized records in declaration order.
//! Per-artifact failures are logged and skipped so one bad artifact never
//! loses the rest of the batch. Only pipeline-wide conditions surface as
//! errors: a staging directory that cannot be created, or the stop signal
//! firing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::archive::{ArchiveConfig, ArchiveError, Archiver, StagedArchive};
use crate::descriptor::{ArtifactDescriptor, StorageLocation};
use crate::location::{assign_location, AssignError};
use crate::signal::StopSignal;
use crate::store::StoreClient;
use crate::validate::{validate_local_path, PathValidationError};

/// Per-artifact errors in the save pipeline
///
/// Every variant skips the artifact; none aborts the batch.
#[derive(Debug, Error)]
pub enum SaveArtifactError {
    /// The descriptor declares no local path
    #[error("artifact {name}: no local path declared")]
    MissingPath { name: String },

    /// The declared path failed validation
    #[error("artifact {name}: {source}")]
    NotFound {
        name: String,
        #[source]
        source: PathValidationError,
    },

    /// Archive staging failed
    #[error("artifact {name}: {source}")]
    Archive {
        name: String,
        #[source]
        source: ArchiveError,
    },

    /// Storage location assignment failed
    #[error("artifact {name}: {source}")]
    Assign {
        name: String,
        #[source]
        source: AssignError,
    },
}

/// Pipeline-wide save failures
#[derive(Debug, Error)]
pub enum SaveError {
    /// Staging directory could not be created
    #[error("cannot create staging directory {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The stop signal fired before the batch completed
    #[error("artifact save stopped before completion")]
    Stopped,
}

/// One artifact's finalized record plus its staging by-products
///
/// Holds the staged archive's cleanup guard: dropping this (or taking just
/// the record) removes the staged file.
#[derive(Debug)]
pub struct SavedArtifact {
    record: ArtifactDescriptor,
    staged: Option<StagedArchive>,
    upload_path: PathBuf,
}

impl SavedArtifact {
    /// The finalized descriptor
    pub fn record(&self) -> &ArtifactDescriptor {
        &self.record
    }

    /// Take the finalized descriptor, dropping any staged archive
    pub fn into_record(self) -> ArtifactDescriptor {
        self.record
    }

    /// The staged archive, when the strategy produced one
    pub fn staged(&self) -> Option<&StagedArchive> {
        self.staged.as_ref()
    }

    /// The path an uploader reads from: the staged archive when one
    /// exists, the artifact's local path otherwise
    pub fn upload_source(&self) -> &Path {
        &self.upload_path
    }
}

/// Saves a step's declared output artifacts
pub struct Saver {
    /// Directory staged archives are written into
    staging_dir: PathBuf,
    /// Step-level default storage location
    default_location: Option<StorageLocation>,
    /// Compression settings for the archive stage
    archive_config: ArchiveConfig,
    /// Cooperative stop flag, checked between artifacts and per entry
    stop: StopSignal,
}

impl Saver {
    /// Create a saver staging archives into the given directory
    pub fn new(staging_dir: PathBuf) -> Self {
        Self {
            staging_dir,
            default_location: None,
            archive_config: ArchiveConfig::default(),
            stop: StopSignal::new(),
        }
    }

    /// Set the step-level default storage location
    pub fn with_default_location(mut self, location: StorageLocation) -> Self {
        self.default_location = Some(location);
        self
    }

    /// Set compression settings for the archive stage
    pub fn with_archive_config(mut self, config: ArchiveConfig) -> Self {
        self.archive_config = config;
        self
    }

    /// Set the stop signal bounding the batch
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Run one descriptor through the full save pipeline
    ///
    /// Validates the declared path, stages the archive when the strategy
    /// asks for one, and assigns the storage location. The input
    /// descriptor is untouched; the finalized record is a copy.
    pub fn save_artifact(
        &self,
        descriptor: &ArtifactDescriptor,
    ) -> Result<SavedArtifact, SaveArtifactError> {
        let name = &descriptor.name;

        let local_path = descriptor
            .local_path
            .clone()
            .ok_or_else(|| SaveArtifactError::MissingPath { name: name.clone() })?;

        validate_local_path(&local_path).map_err(|source| SaveArtifactError::NotFound {
            name: name.clone(),
            source,
        })?;

        let archiver = Archiver::new(self.staging_dir.clone())
            .with_config(self.archive_config)
            .with_stop_signal(self.stop.clone());
        let staged = archiver
            .stage(&local_path, descriptor.archive_strategy, name)
            .map_err(|source| SaveArtifactError::Archive {
                name: name.clone(),
                source,
            })?;

        let mut record = descriptor.clone();
        assign_location(&mut record, self.default_location.as_ref()).map_err(|source| {
            SaveArtifactError::Assign {
                name: name.clone(),
                source,
            }
        })?;

        let upload_path = match &staged {
            Some(staged) => staged.path().to_path_buf(),
            None => local_path,
        };

        Ok(SavedArtifact {
            record,
            staged,
            upload_path,
        })
    }

    /// Save every declared artifact, in declaration order
    ///
    /// Artifacts that fail are logged and skipped; the returned records
    /// keep the survivors' relative order. Callers that need "everything
    /// saved" compare lengths. Staged archives are transient here and are
    /// removed as each record is collected; use [`Saver::save_artifact`]
    /// when the staged bytes are needed.
    pub fn save_all(
        &self,
        descriptors: &[ArtifactDescriptor],
    ) -> Result<Vec<ArtifactDescriptor>, SaveError> {
        fs::create_dir_all(&self.staging_dir).map_err(|source| SaveError::Staging {
            path: self.staging_dir.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for descriptor in descriptors {
            if self.stop.is_stopped() {
                return Err(SaveError::Stopped);
            }

            match self.save_artifact(descriptor) {
                Ok(saved) => records.push(saved.into_record()),
                Err(SaveArtifactError::Archive {
                    source: ArchiveError::Cancelled,
                    ..
                }) => return Err(SaveError::Stopped),
                Err(err) => {
                    warn!("Skipping {}", err);
                }
            }
        }

        debug!(
            "Saved {} of {} declared artifacts",
            records.len(),
            descriptors.len()
        );
        Ok(records)
    }

    /// Save every declared artifact and upload each through `client`
    ///
    /// Same skip semantics as [`Saver::save_all`], with upload failures
    /// joining the per-artifact skip taxa. Each staged archive is released
    /// once its upload finishes, so the staging directory is empty again
    /// when the call returns.
    pub fn save_and_put(
        &self,
        client: &dyn StoreClient,
        descriptors: &[ArtifactDescriptor],
    ) -> Result<Vec<ArtifactDescriptor>, SaveError> {
        fs::create_dir_all(&self.staging_dir).map_err(|source| SaveError::Staging {
            path: self.staging_dir.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for descriptor in descriptors {
            if self.stop.is_stopped() {
                return Err(SaveError::Stopped);
            }

            let saved = match self.save_artifact(descriptor) {
                Ok(saved) => saved,
                Err(SaveArtifactError::Archive {
                    source: ArchiveError::Cancelled,
                    ..
                }) => return Err(SaveError::Stopped),
                Err(err) => {
                    warn!("Skipping {}", err);
                    continue;
                }
            };

            // Finalized records always carry a location.
            let location = match &saved.record().storage_location {
                Some(location) => location.clone(),
                None => continue,
            };

            match client.put(saved.upload_source(), &location) {
                Ok(()) => records.push(saved.into_record()),
                Err(err) => {
                    warn!("Skipping artifact {}: {}", descriptor.name, err);
                }
            }
        }

        debug!(
            "Uploaded {} of {} declared artifacts",
            records.len(),
            descriptors.len()
        );
        Ok(records)
    }
}
