use crate::archive::traits::{ArchiveError, ArchiveResult, ArchiveStore};
use crate::state::ArtifactKind;
use chrono::NaiveDate;
use std::sync::Arc;

/// What a commit did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A well-formed artifact already existed and was left alone
    Skipped,

    /// The content was written to the canonical location
    Written,
}

/// Commits artifacts so that re-running a sync never rewrites complete work
///
/// Errors are returned to the caller untouched; retrying them is the batch
/// runner's job.
#[derive(Clone)]
pub struct IdempotentWriter {
    store: Arc<dyn ArchiveStore>,
}

impl IdempotentWriter {
    pub fn new(store: Arc<dyn ArchiveStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ArchiveStore> {
        &self.store
    }

    /// Writes `content` as `kind`'s artifact for `date` unless one already exists
    ///
    /// With `force` an existing artifact is replaced. Empty content is
    /// rejected so an empty file can never pass for a complete artifact.
    pub fn commit(
        &self,
        date: NaiveDate,
        kind: ArtifactKind,
        content: &str,
        force: bool,
    ) -> ArchiveResult<WriteOutcome> {
        if !force && self.store.is_well_formed(kind, date)? {
            tracing::debug!(kind = %kind, date = %date, "Artifact already complete, skipping write");
            return Ok(WriteOutcome::Skipped);
        }

        if content.trim().is_empty() {
            return Err(ArchiveError::EmptyArtifact { kind, date });
        }

        self.store.write_atomic(kind, date, content)?;
        tracing::debug!(
            kind = %kind,
            date = %date,
            bytes = content.len(),
            path = %self.store.path_for(kind, date).display(),
            "Wrote artifact"
        );
        Ok(WriteOutcome::Written)
    }

    /// Runs [`commit`](Self::commit) on the blocking pool
    ///
    /// The write runs to completion even if the returned future is dropped,
    /// so cancelling a run never abandons a write half-way.
    pub async fn commit_detached(
        &self,
        date: NaiveDate,
        kind: ArtifactKind,
        content: String,
        force: bool,
    ) -> ArchiveResult<WriteOutcome> {
        let writer = self.clone();
        let path = self.store.path_for(kind, date);
        tokio::task::spawn_blocking(move || writer.commit(date, kind, &content, force))
            .await
            .map_err(|e| ArchiveError::io(path, std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}
