//! Local path validation for declared artifacts
//!
//! A declared output must exist on the step's volume before it is archived
//! or assigned a storage location. Validation is a single stat. Missing and
//! unreadable paths share one error taxon: the io source carries the
//! original cause, and both lead to the same skip decision upstream.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors during artifact path validation
#[derive(Debug, Error)]
pub enum PathValidationError {
    /// Declared path is missing or unreadable
    #[error("artifact path {path} not found: {source}")]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PathValidationError {
    /// The path that failed validation
    pub fn path(&self) -> &Path {
        match self {
            PathValidationError::NotFound { path, .. } => path,
        }
    }
}

/// Check that a declared artifact path exists and is readable
///
/// Follows symlinks, so a dangling link fails the same way a missing path
/// does. Nothing on the filesystem is touched beyond the stat.
pub fn validate_local_path(path: &Path) -> Result<(), PathValidationError> {
    match fs::metadata(path) {
        Ok(_) => Ok(()),
        Err(source) => Err(PathValidationError::NotFound {
            path: path.to_path_buf(),
            source,
        }),
    }
}
