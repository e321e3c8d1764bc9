//! Filesystem archive
//!
//! Artifacts live at `<root>/<kind dir>/<date><suffix>`. Writes go to a
//! temporary file in the destination directory which is synced and then
//! renamed over the canonical path, so an interrupted write leaves either the
//! previous artifact or nothing, plus at most a temporary file that is never
//! mistaken for an artifact.

use crate::archive::layout::{
    artifact_path, check_well_formed, is_temp_file_name, rollup_path, rollup_temp_prefix,
    temp_prefix, MONTHLY_DIR,
};
use crate::archive::traits::{ArchiveError, ArchiveResult, ArchiveStore};
use crate::state::ArtifactKind;
use chrono::NaiveDate;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Archive stored as plain files under a root directory
#[derive(Debug, Clone)]
pub struct FsArchive {
    root: PathBuf,
}

impl FsArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the root, every kind directory and the rollup directory
    pub fn ensure_layout(&self) -> ArchiveResult<()> {
        for dir in self.managed_dirs() {
            fs::create_dir_all(&dir).map_err(|e| ArchiveError::io(&dir, e))?;
        }
        Ok(())
    }

    fn managed_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = ArtifactKind::ALL
            .iter()
            .map(|kind| self.root.join(kind.dir_name()))
            .collect();
        dirs.push(self.root.join(ArtifactKind::Analytics.dir_name()).join(MONTHLY_DIR));
        dirs
    }

    /// Removes leftover temporary files from interrupted writes
    ///
    /// Returns how many were removed.
    pub fn sweep_temp_files(&self) -> ArchiveResult<usize> {
        let mut removed = 0;
        for dir in self.managed_dirs() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(ArchiveError::io(&dir, e)),
            };
            for entry in entries {
                let entry = entry.map_err(|e| ArchiveError::io(&dir, e))?;
                let name = entry.file_name();
                if is_temp_file_name(&name.to_string_lossy()) {
                    let path = entry.path();
                    fs::remove_file(&path).map_err(|e| ArchiveError::io(&path, e))?;
                    tracing::debug!(path = %path.display(), "Removed stale temporary file");
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Writes `content` to a synced temporary file beside `path`, then renames it over `path`
    fn replace_file(&self, path: &Path, prefix: &str, content: &str) -> ArchiveResult<()> {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        fs::create_dir_all(&dir).map_err(|e| ArchiveError::io(&dir, e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(prefix)
            .tempfile_in(&dir)
            .map_err(|e| ArchiveError::io(&dir, e))?;

        tmp.write_all(content.as_bytes())
            .map_err(|e| ArchiveError::io(tmp.path(), e))?;
        tmp.flush().map_err(|e| ArchiveError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| ArchiveError::io(tmp.path(), e))?;

        tmp.persist(path)
            .map_err(|e| ArchiveError::io(path, e.error))?;

        // Make the rename itself durable
        #[cfg(unix)]
        if let Err(e) = fs::File::open(&dir).and_then(|handle| handle.sync_all()) {
            tracing::warn!(dir = %dir.display(), error = %e, "Could not sync directory after rename");
        }

        Ok(())
    }

    fn read_bytes(&self, path: &Path) -> ArchiveResult<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ArchiveError::io(path, e)),
        }
    }
}

impl ArchiveStore for FsArchive {
    fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, kind: ArtifactKind, date: NaiveDate) -> PathBuf {
        artifact_path(&self.root, kind, date)
    }

    fn is_well_formed(&self, kind: ArtifactKind, date: NaiveDate) -> ArchiveResult<bool> {
        let path = self.path_for(kind, date);
        Ok(match self.read_bytes(&path)? {
            Some(bytes) => check_well_formed(kind, &bytes).is_ok(),
            None => false,
        })
    }

    fn read(&self, kind: ArtifactKind, date: NaiveDate) -> ArchiveResult<String> {
        let path = self.path_for(kind, date);
        let bytes = self
            .read_bytes(&path)?
            .ok_or(ArchiveError::NotFound { kind, date })?;

        check_well_formed(kind, &bytes)
            .map_err(|reason| ArchiveError::Malformed { kind, date, reason })?;

        String::from_utf8(bytes).map_err(|e| ArchiveError::Malformed {
            kind,
            date,
            reason: e.to_string(),
        })
    }

    fn write_atomic(&self, kind: ArtifactKind, date: NaiveDate, content: &str) -> ArchiveResult<()> {
        let path = self.path_for(kind, date);
        self.replace_file(&path, &temp_prefix(kind, date), content)
    }

    fn rollup_path(&self, month: NaiveDate) -> PathBuf {
        rollup_path(&self.root, month)
    }

    fn write_rollup(&self, month: NaiveDate, content: &str) -> ArchiveResult<()> {
        let path = self.rollup_path(month);
        self.replace_file(&path, &rollup_temp_prefix(month), content)
    }

    fn list_dates(&self, kind: ArtifactKind) -> ArchiveResult<Vec<NaiveDate>> {
        let dir = self.root.join(kind.dir_name());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ArchiveError::io(&dir, e)),
        };

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ArchiveError::io(&dir, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if is_temp_file_name(&name) {
                continue;
            }
            if let Some(date) = kind.parse_file_name(&name) {
                dates.push(date);
            }
        }

        dates.sort();
        dates.dedup();
        Ok(dates)
    }
}
