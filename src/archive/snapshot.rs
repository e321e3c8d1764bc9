use crate::archive::traits::{ArchiveResult, ArchiveStore};
use crate::state::ArtifactKind;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// The set of complete (kind, date) pairs observed at one point in time
///
/// Taken once at the start of a run; gap detection and the per-date skip
/// decisions all read from the same snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSnapshot {
    complete: BTreeMap<ArtifactKind, BTreeSet<NaiveDate>>,
}

impl ArchiveSnapshot {
    /// Scans `store` for every kind, keeping only well-formed artifacts
    pub fn capture(store: &dyn ArchiveStore) -> ArchiveResult<Self> {
        let mut snapshot = Self::default();
        for kind in ArtifactKind::ALL {
            for date in store.list_dates(kind)? {
                if store.is_well_formed(kind, date)? {
                    snapshot.insert(kind, date);
                } else {
                    tracing::debug!(kind = %kind, date = %date, "Ignoring malformed artifact");
                }
            }
        }
        Ok(snapshot)
    }

    /// Builds a snapshot from explicit dates
    pub fn from_dates(entries: impl IntoIterator<Item = (ArtifactKind, NaiveDate)>) -> Self {
        let mut snapshot = Self::default();
        for (kind, date) in entries {
            snapshot.insert(kind, date);
        }
        snapshot
    }

    pub fn insert(&mut self, kind: ArtifactKind, date: NaiveDate) {
        self.complete.entry(kind).or_default().insert(date);
    }

    pub fn is_complete(&self, kind: ArtifactKind, date: NaiveDate) -> bool {
        self.complete
            .get(&kind)
            .map_or(false, |dates| dates.contains(&date))
    }

    /// Complete dates for `kind`, ascending
    pub fn dates(&self, kind: ArtifactKind) -> impl Iterator<Item = NaiveDate> + '_ {
        self.complete.get(&kind).into_iter().flatten().copied()
    }

    pub fn earliest(&self, kind: ArtifactKind) -> Option<NaiveDate> {
        self.complete
            .get(&kind)
            .and_then(|dates| dates.iter().next().copied())
    }

    pub fn latest(&self, kind: ArtifactKind) -> Option<NaiveDate> {
        self.complete
            .get(&kind)
            .and_then(|dates| dates.iter().next_back().copied())
    }

    pub fn count(&self, kind: ArtifactKind) -> usize {
        self.complete.get(&kind).map_or(0, BTreeSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.complete.values().all(BTreeSet::is_empty)
    }
}
