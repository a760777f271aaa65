//! Archive staging for output artifacts
//!
//! Packs an artifact's file or directory into a single staged archive
//! ahead of upload. Pass-through artifacts stage nothing. Directory
//! entries land in the archive relative to the source root with the root
//! component stripped; a file source becomes a single entry named after
//! its final component. Symlinks are followed, so the archive carries the
//! content they point to.
//!
//! Staged files are written to a unique temp name and renamed into place.
//! The returned `StagedArchive` removes the file when dropped, which keeps
//! failure and stop paths from leaking temp files.

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tar::Builder;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::descriptor::ArchiveStrategy;
use crate::signal::StopSignal;

/// Default compression level for gzip and deflate streams
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Errors for archive staging operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Path is not within the source root: {0}")]
    PathOutsideSource(PathBuf),

    #[error("invalid archive config: {0}")]
    InvalidConfig(#[from] ArchiveConfigError),

    #[error("archive staging stopped before completion")]
    Cancelled,
}

/// Archive configuration validation errors
#[derive(Debug, Error)]
pub enum ArchiveConfigError {
    #[error("compression_level must be in [0, 9], got {value}")]
    CompressionLevelOutOfBounds { value: u32 },
}

/// Archive staging configuration
#[derive(Debug, Clone, Copy)]
pub struct ArchiveConfig {
    /// Compression level for gzip and deflate streams (0-9, default 6)
    pub compression_level: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl ArchiveConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ArchiveConfigError> {
        if self.compression_level > 9 {
            return Err(ArchiveConfigError::CompressionLevelOutOfBounds {
                value: self.compression_level,
            });
        }
        Ok(())
    }
}

/// A staged archive file with its cleanup guard
///
/// The file is removed when this drops. `keep` disarms the guard and hands
/// the file over to the caller.
#[derive(Debug)]
pub struct StagedArchive {
    path: PathBuf,
    size_bytes: u64,
    sha256: String,
    keep: bool,
}

impl StagedArchive {
    /// Path of the staged file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the staged file in bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// SHA-256 of the staged file contents
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Disarm the cleanup guard and return the staged path
    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for StagedArchive {
    fn drop(&mut self) {
        if !self.keep {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Stages artifact archives into a staging directory
pub struct Archiver {
    /// Directory staged archives are written into
    staging_dir: PathBuf,
    /// Compression settings
    config: ArchiveConfig,
    /// Cooperative stop flag, polled per archive entry
    stop: StopSignal,
}

impl Archiver {
    /// Create an archiver staging into the given directory
    pub fn new(staging_dir: PathBuf) -> Self {
        Self {
            staging_dir,
            config: ArchiveConfig::default(),
            stop: StopSignal::new(),
        }
    }

    /// Set compression settings
    pub fn with_config(mut self, config: ArchiveConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the stop signal polled during staging
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Stage `source` under the given strategy
    ///
    /// Pass-through returns `Ok(None)` and touches nothing, not even the
    /// staging directory. For the archiving strategies the staged file is
    /// named `{stem}{extension}` inside the staging directory.
    pub fn stage(
        &self,
        source: &Path,
        strategy: ArchiveStrategy,
        stem: &str,
    ) -> Result<Option<StagedArchive>, ArchiveError> {
        let format = match ArchiveFormat::for_strategy(strategy) {
            Some(format) => format,
            None => return Ok(None),
        };

        self.config.validate()?;
        fs::create_dir_all(&self.staging_dir)?;

        let stem = sanitize_stem(stem);
        let staged_path = self
            .staging_dir
            .join(format!("{}{}", stem, strategy.extension()));
        let tmp_path = self
            .staging_dir
            .join(format!("{}.{}.tmp", stem, staging_token()));

        match self.write_and_seal(source, format, &tmp_path, &staged_path) {
            Ok(staged) => {
                debug!(
                    "Staged archive {} ({} bytes)",
                    staged.path.display(),
                    staged.size_bytes
                );
                Ok(Some(staged))
            }
            Err(err) => {
                let _ = fs::remove_file(&tmp_path);
                Err(err)
            }
        }
    }

    /// Write the archive to the temp path, digest it, rename into place
    fn write_and_seal(
        &self,
        source: &Path,
        format: ArchiveFormat,
        tmp_path: &Path,
        staged_path: &Path,
    ) -> Result<StagedArchive, ArchiveError> {
        match format {
            ArchiveFormat::TarGzip => self.write_tar_gzip(source, tmp_path)?,
            ArchiveFormat::Zip => self.write_zip(source, tmp_path)?,
        }

        let size_bytes = fs::metadata(tmp_path)?.len();
        let sha256 = sha256_of_file(tmp_path)?;
        fs::rename(tmp_path, staged_path)?;

        Ok(StagedArchive {
            path: staged_path.to_path_buf(),
            size_bytes,
            sha256,
            keep: false,
        })
    }

    /// Write a gzip-compressed tarball of `source`
    fn write_tar_gzip(&self, source: &Path, out_path: &Path) -> Result<(), ArchiveError> {
        let entries = collect_entries(source, &self.stop)?;

        let file = File::create(out_path)?;
        let encoder = GzEncoder::new(file, Compression::new(self.config.compression_level));
        let mut builder = Builder::new(encoder);

        for (rel_path, entry) in &entries {
            if self.stop.is_stopped() {
                return Err(ArchiveError::Cancelled);
            }
            match entry.kind {
                EntryKind::Directory => builder.append_dir(rel_path, &entry.full_path)?,
                EntryKind::File => builder.append_path_with_name(&entry.full_path, rel_path)?,
            }
        }

        let encoder = builder.into_inner()?;
        encoder.finish()?;
        Ok(())
    }

    /// Write a deflate-compressed zip of `source`
    fn write_zip(&self, source: &Path, out_path: &Path) -> Result<(), ArchiveError> {
        let entries = collect_entries(source, &self.stop)?;

        let file = File::create(out_path)?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(self.config.compression_level as i64));

        for (rel_path, entry) in &entries {
            if self.stop.is_stopped() {
                return Err(ArchiveError::Cancelled);
            }
            let name = zip_entry_name(rel_path);
            match entry.kind {
                EntryKind::Directory => {
                    writer.add_directory(name, options)?;
                }
                EntryKind::File => {
                    writer.start_file(name, options)?;
                    let mut src = File::open(&entry.full_path)?;
                    io::copy(&mut src, &mut writer)?;
                }
            }
        }

        writer.finish()?;
        Ok(())
    }
}

/// Entry kind inside a staged archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Directory,
}

/// A collected entry: where it lives on disk and what it is
struct StagedEntry {
    full_path: PathBuf,
    kind: EntryKind,
}

/// Strategies that produce a staged file
#[derive(Debug, Clone, Copy)]
enum ArchiveFormat {
    TarGzip,
    Zip,
}

impl ArchiveFormat {
    fn for_strategy(strategy: ArchiveStrategy) -> Option<Self> {
        match strategy {
            ArchiveStrategy::None => None,
            ArchiveStrategy::TarGzip => Some(ArchiveFormat::TarGzip),
            ArchiveStrategy::Zip => Some(ArchiveFormat::Zip),
        }
    }
}

/// Collect archive entries keyed by their path relative to the source root
///
/// Sorted so archives are deterministic for the same source tree. A file
/// source yields one entry named after its final component.
fn collect_entries(
    source: &Path,
    stop: &StopSignal,
) -> Result<BTreeMap<PathBuf, StagedEntry>, ArchiveError> {
    let metadata = fs::metadata(source)?;
    let mut entries = BTreeMap::new();

    if metadata.is_file() {
        let name = source
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("artifact"));
        entries.insert(
            name,
            StagedEntry {
                full_path: source.to_path_buf(),
                kind: EntryKind::File,
            },
        );
        return Ok(entries);
    }

    for entry in WalkDir::new(source)
        .follow_links(true)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        if stop.is_stopped() {
            return Err(ArchiveError::Cancelled);
        }

        let entry = entry?;
        let rel_path = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| ArchiveError::PathOutsideSource(entry.path().to_path_buf()))?;

        // Skip the root itself
        if rel_path.as_os_str().is_empty() {
            continue;
        }

        let kind = if entry.file_type().is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        entries.insert(
            rel_path.to_path_buf(),
            StagedEntry {
                full_path: entry.path().to_path_buf(),
                kind,
            },
        );
    }

    Ok(entries)
}

/// Staged file stem for an artifact name (path separators flattened)
fn sanitize_stem(name: &str) -> String {
    name.replace(['/', '\\'], "-")
}

/// Unique token for staged temp file names
fn staging_token() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

/// Zip entry name: relative path components joined with forward slashes
fn zip_entry_name(rel_path: &Path) -> String {
    rel_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// SHA-256 of a file's contents, hex encoded
fn sha256_of_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
