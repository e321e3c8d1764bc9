//! Archive traits and error types
//!
//! This module defines the trait interface for archive backends and
//! associated error types.

use crate::state::ArtifactKind;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during archive operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to write empty {kind} artifact for {date}")]
    EmptyArtifact { kind: ArtifactKind, date: NaiveDate },

    #[error("Malformed {kind} artifact for {date}: {reason}")]
    Malformed {
        kind: ArtifactKind,
        date: NaiveDate,
        reason: String,
    },

    #[error("No {kind} artifact for {date}")]
    NotFound { kind: ArtifactKind, date: NaiveDate },
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Trait for archive backend implementations
///
/// An archive maps every (kind, date) pair to one canonical location. The
/// status of a pair is never stored: an artifact is complete exactly when
/// its canonical file is well-formed.
pub trait ArchiveStore: Send + Sync {
    /// Root directory of the archive
    fn root(&self) -> &Path;

    /// Canonical location of an artifact
    fn path_for(&self, kind: ArtifactKind, date: NaiveDate) -> PathBuf;

    /// Returns true if the artifact exists and is well-formed
    fn is_well_formed(&self, kind: ArtifactKind, date: NaiveDate) -> ArchiveResult<bool>;

    /// Reads a well-formed artifact
    ///
    /// Fails with `NotFound` if it does not exist and `Malformed` if it exists
    /// but is not well-formed.
    fn read(&self, kind: ArtifactKind, date: NaiveDate) -> ArchiveResult<String>;

    /// Replaces the artifact atomically: readers see the old content or the new, never a mix
    fn write_atomic(&self, kind: ArtifactKind, date: NaiveDate, content: &str) -> ArchiveResult<()>;

    /// Location of the monthly rollup for the month containing `month`
    fn rollup_path(&self, month: NaiveDate) -> PathBuf;

    /// Replaces a monthly rollup atomically
    fn write_rollup(&self, month: NaiveDate, content: &str) -> ArchiveResult<()>;

    /// Dates with a canonically named file for `kind`, ascending
    ///
    /// Well-formedness is not checked here; temporary files are never listed.
    fn list_dates(&self, kind: ArtifactKind) -> ArchiveResult<Vec<NaiveDate>>;
}
