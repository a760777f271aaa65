//! step-outbox - Output artifact save/report pipeline
//!
//! This crate implements the output side of a workflow step executor:
//! after a step runs, it locates the declared output artifacts on local
//! disk, validates them, optionally packs each into a tar-gzip or zip
//! archive, assigns every artifact a remote storage location, and produces
//! the finalized JSON snapshot reported back to the orchestrator. The
//! actual object-store upload stays behind the [`store::StoreClient`]
//! seam.

pub mod archive;
pub mod descriptor;
pub mod location;
pub mod report;
pub mod saver;
pub mod signal;
pub mod store;
pub mod validate;

pub use archive::{
    ArchiveConfig, ArchiveConfigError, ArchiveError, Archiver, StagedArchive,
    DEFAULT_COMPRESSION_LEVEL,
};
pub use descriptor::{ArchiveStrategy, ArtifactDescriptor, StorageLocation};
pub use location::{assign_location, derive_key, AssignError};
pub use report::{OutputSnapshot, ReportError, OUTPUTS_SCHEMA_ID, OUTPUTS_SCHEMA_VERSION};
pub use saver::{SaveArtifactError, SaveError, SavedArtifact, Saver};
pub use signal::StopSignal;
pub use store::{MemoryStoreClient, StoreClient, StoreError, StoredObject};
pub use validate::{validate_local_path, PathValidationError};
