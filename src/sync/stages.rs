//! Stage orchestration for a single date
//!
//! A pass walks the kinds selected for the date in dependency order and
//! advances every kind whose upstream is complete. Kinds that are not
//! selected but already exist in the archive count as complete upstreams;
//! they are read, never produced.

use crate::archive::{ArchiveError, ArchiveSnapshot, ArchiveStore, IdempotentWriter, WriteOutcome};
use crate::remote::{FetchError, PageFetcher};
use crate::render::{RenderError, Renderer};
use crate::state::{ArtifactKind, ArtifactStatus};
use crate::sync::report::{EntryOutcome, ReportEntry};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of trying to advance one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStep {
    /// The artifact is complete
    Done(WriteOutcome),

    /// The remote service had nothing to write for this date
    NoData,

    /// The upstream kind is not complete yet
    Waiting,

    /// Production failed; `fatal` failures are not retried at day level
    Failed { message: String, fatal: bool },

    /// Cancellation stopped the stage before it finished
    Cancelled,
}

/// Per-kind bookkeeping inside a [`DayState`]
#[derive(Debug, Clone)]
struct KindState {
    status: ArtifactStatus,
    /// Set only when this run committed the artifact
    written: Option<WriteOutcome>,
    no_data: bool,
    fatal: bool,
    attempts: u32,
    message: Option<String>,
}

impl KindState {
    fn new(status: ArtifactStatus) -> Self {
        Self {
            status,
            written: None,
            no_data: false,
            fatal: false,
            attempts: 0,
            message: None,
        }
    }
}

/// Status of every kind for one date while it is being processed
#[derive(Debug, Clone)]
pub struct DayState {
    date: NaiveDate,
    selected: Vec<ArtifactKind>,
    force: bool,
    kinds: BTreeMap<ArtifactKind, KindState>,
}

impl DayState {
    /// Seeds the day from the snapshot
    ///
    /// Every kind present in the snapshot starts Complete, except selected
    /// kinds under `force`, which start Missing so they are produced again.
    pub fn new(
        date: NaiveDate,
        selected: &[ArtifactKind],
        snapshot: &ArchiveSnapshot,
        force: bool,
    ) -> Self {
        let mut selected = selected.to_vec();
        selected.sort();
        selected.dedup();

        let kinds = ArtifactKind::ALL
            .into_iter()
            .map(|kind| {
                let in_archive = snapshot.is_complete(kind, date);
                let is_selected = selected.contains(&kind);
                let status = if in_archive && !(force && is_selected) {
                    ArtifactStatus::Complete
                } else {
                    ArtifactStatus::Missing
                };
                (kind, KindState::new(status))
            })
            .collect();

        Self {
            date,
            selected,
            force,
            kinds,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn status(&self, kind: ArtifactKind) -> ArtifactStatus {
        self.kinds
            .get(&kind)
            .map_or(ArtifactStatus::Missing, |state| state.status)
    }

    pub fn attempts(&self, kind: ArtifactKind) -> u32 {
        self.kinds.get(&kind).map_or(0, |state| state.attempts)
    }

    pub fn message(&self, kind: ArtifactKind) -> Option<&str> {
        self.kinds.get(&kind).and_then(|state| state.message.as_deref())
    }

    /// Returns true if any selected kind is Failed
    pub fn has_failures(&self) -> bool {
        self.selected
            .iter()
            .any(|kind| self.status(*kind) == ArtifactStatus::Failed)
    }

    /// Returns true if a day-level retry could change the outcome
    pub fn has_retryable_failures(&self) -> bool {
        self.selected.iter().any(|kind| {
            self.kinds
                .get(kind)
                .map_or(false, |s| s.status == ArtifactStatus::Failed && !s.fatal)
        })
    }

    /// Moves non-fatal failures back to Missing for another day attempt
    ///
    /// Returns how many kinds were reset.
    pub fn reset_failed(&mut self) -> usize {
        let mut reset = 0;
        for kind in &self.selected {
            if let Some(state) = self.kinds.get_mut(kind) {
                if state.status == ArtifactStatus::Failed && !state.fatal {
                    state.status = ArtifactStatus::Missing;
                    reset += 1;
                }
            }
        }
        reset
    }

    fn transition(&mut self, kind: ArtifactKind, next: ArtifactStatus) {
        if let Some(state) = self.kinds.get_mut(&kind) {
            debug_assert!(
                state.status.can_transition_to(next),
                "illegal transition {} -> {} for {}",
                state.status,
                next,
                kind
            );
            state.status = next;
        }
    }

    fn apply(&mut self, kind: ArtifactKind, step: &StageStep) {
        match step {
            StageStep::Done(outcome) => {
                self.transition(kind, ArtifactStatus::Complete);
                if let Some(state) = self.kinds.get_mut(&kind) {
                    state.written = Some(*outcome);
                    state.message = None;
                }
            }
            StageStep::NoData => {
                self.transition(kind, ArtifactStatus::Missing);
                if let Some(state) = self.kinds.get_mut(&kind) {
                    state.no_data = true;
                    state.message = Some("no remote data for this date".to_string());
                }
            }
            StageStep::Failed { message, fatal } => {
                self.transition(kind, ArtifactStatus::Failed);
                if let Some(state) = self.kinds.get_mut(&kind) {
                    state.fatal = *fatal;
                    state.message = Some(message.clone());
                }
            }
            StageStep::Cancelled | StageStep::Waiting => {
                self.transition(kind, ArtifactStatus::Missing)
            }
        }
    }

    /// Final outcome of each selected kind
    ///
    /// `cancelled` turns unfinished kinds into Cancelled instead of Blocked.
    pub fn into_entries(self, cancelled: bool) -> Vec<ReportEntry> {
        self.selected
            .iter()
            .map(|kind| {
                let state = &self.kinds[kind];
                let (outcome, message) = match state.status {
                    ArtifactStatus::Complete if state.written == Some(WriteOutcome::Written) => {
                        (EntryOutcome::Complete, None)
                    }
                    ArtifactStatus::Complete => (EntryOutcome::Skipped, None),
                    ArtifactStatus::Failed => (EntryOutcome::Failed, state.message.clone()),
                    _ if state.no_data => (EntryOutcome::NoData, state.message.clone()),
                    _ if cancelled => (EntryOutcome::Cancelled, None),
                    _ => {
                        let waiting_on = kind
                            .upstream()
                            .map(|up| format!("{} is {}", up, self.status(up)))
                            .unwrap_or_else(|| "not attempted".to_string());
                        (EntryOutcome::Blocked, Some(waiting_on))
                    }
                };

                let mut entry =
                    ReportEntry::new(self.date, *kind, outcome).with_attempts(state.attempts);
                entry.message = message;
                entry
            })
            .collect()
    }
}

/// Summary of one pass over a date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassResult {
    /// At least one kind changed state
    pub changed: bool,

    /// The pass stopped early because of cancellation
    pub cancelled: bool,
}

/// Produces artifacts for one date, stage by stage
pub struct StageOrchestrator {
    fetcher: Arc<PageFetcher>,
    store: Arc<dyn ArchiveStore>,
    writer: IdempotentWriter,
    renderer: Renderer,
}

impl StageOrchestrator {
    pub fn new(fetcher: Arc<PageFetcher>, store: Arc<dyn ArchiveStore>, renderer: Renderer) -> Self {
        Self {
            fetcher,
            writer: IdempotentWriter::new(store.clone()),
            store,
            renderer,
        }
    }

    /// Runs one pass over the day's selected kinds in dependency order
    pub async fn run_pass(&self, day: &mut DayState, cancel: &CancellationToken) -> PassResult {
        let mut result = PassResult::default();
        let selected = day.selected.clone();

        for kind in selected {
            let state = &day.kinds[&kind];
            if state.status.is_terminal() || state.no_data {
                continue;
            }

            if let Some(up) = kind.upstream() {
                if !day.status(up).is_complete() {
                    tracing::trace!(kind = %kind, date = %day.date, upstream = %up, "Waiting on upstream");
                    continue;
                }
            }

            if cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }

            day.transition(kind, ArtifactStatus::InProgress);
            if let Some(state) = day.kinds.get_mut(&kind) {
                state.attempts += 1;
            }

            let step = self.produce(kind, day.date, day.force, cancel).await;
            match &step {
                StageStep::Done(outcome) => {
                    tracing::debug!(kind = %kind, date = %day.date, outcome = ?outcome, "Stage complete")
                }
                StageStep::NoData => {
                    tracing::info!(kind = %kind, date = %day.date, "No remote data")
                }
                StageStep::Failed { message, fatal } => tracing::warn!(
                    kind = %kind,
                    date = %day.date,
                    fatal,
                    error = %message,
                    "Stage failed"
                ),
                StageStep::Waiting | StageStep::Cancelled => {}
            }

            day.apply(kind, &step);
            match step {
                StageStep::Cancelled => {
                    result.cancelled = true;
                    break;
                }
                StageStep::Waiting => {}
                _ => result.changed = true,
            }
        }

        result
    }

    /// Produces one artifact; the upstream is known to be complete
    async fn produce(
        &self,
        kind: ArtifactKind,
        date: NaiveDate,
        force: bool,
        cancel: &CancellationToken,
    ) -> StageStep {
        let content = if kind.is_remote() {
            match self.fetch_and_render(kind, date, cancel).await {
                Ok(Some(content)) => content,
                Ok(None) => return StageStep::NoData,
                Err(step) => return step,
            }
        } else {
            match self.render_from_upstream(kind, date).await {
                Ok(content) => content,
                Err(step) => return step,
            }
        };

        match self.writer.commit_detached(date, kind, content, force).await {
            Ok(outcome) => StageStep::Done(outcome),
            Err(err) => StageStep::Failed {
                fatal: matches!(err, ArchiveError::EmptyArtifact { .. }),
                message: err.to_string(),
            },
        }
    }

    async fn fetch_and_render(
        &self,
        kind: ArtifactKind,
        date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, StageStep> {
        let records = match self.fetcher.fetch_day(kind, date, cancel).await {
            Ok(records) => records,
            Err(FetchError::Cancelled) => return Err(StageStep::Cancelled),
            Err(err) => {
                return Err(StageStep::Failed {
                    fatal: err.is_fatal(),
                    message: err.to_string(),
                })
            }
        };

        if records.is_empty() {
            return Ok(None);
        }

        self.renderer
            .render_remote(kind, date, &records)
            .map_err(render_failure)
    }

    async fn render_from_upstream(&self, kind: ArtifactKind, date: NaiveDate) -> Result<String, StageStep> {
        let upstream = kind.upstream().ok_or_else(|| StageStep::Failed {
            message: format!("{} has no upstream to derive from", kind),
            fatal: true,
        })?;

        let store = self.store.clone();
        let text = tokio::task::spawn_blocking(move || store.read(upstream, date))
            .await
            .map_err(|e| StageStep::Failed {
                message: format!("reading {} failed: {}", upstream, e),
                fatal: false,
            })?
            .map_err(|e| match e {
                ArchiveError::NotFound { .. } => StageStep::Waiting,
                e => StageStep::Failed {
                    message: e.to_string(),
                    fatal: false,
                },
            })?;

        self.renderer
            .render_local(kind, date, &text)
            .await
            .map_err(render_failure)
    }
}

/// Summarizer errors may be transient; malformed input never fixes itself
fn render_failure(err: RenderError) -> StageStep {
    StageStep::Failed {
        fatal: !matches!(err, RenderError::Summarizer(_)),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
    }

    #[test]
    fn test_seeding_from_snapshot() {
        let snapshot = ArchiveSnapshot::from_dates([
            (ArtifactKind::RawTranscript, date()),
            (ArtifactKind::Summary, date()),
        ]);
        let day = DayState::new(
            date(),
            &[ArtifactKind::StructuredContent, ArtifactKind::Summary],
            &snapshot,
            false,
        );

        // Not selected but archived: usable as an upstream
        assert_eq!(day.status(ArtifactKind::RawTranscript), ArtifactStatus::Complete);
        assert_eq!(day.status(ArtifactKind::StructuredContent), ArtifactStatus::Missing);
        assert_eq!(day.status(ArtifactKind::Summary), ArtifactStatus::Complete);

        let entries = day.into_entries(false);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, ArtifactKind::StructuredContent);
        assert_eq!(entries[0].outcome, EntryOutcome::Blocked);
        assert_eq!(entries[1].outcome, EntryOutcome::Skipped);
    }

    #[test]
    fn test_force_reseeds_selected_only() {
        let snapshot = ArchiveSnapshot::from_dates([
            (ArtifactKind::RawTranscript, date()),
            (ArtifactKind::Summary, date()),
        ]);
        let day = DayState::new(date(), &[ArtifactKind::Summary], &snapshot, true);

        assert_eq!(day.status(ArtifactKind::RawTranscript), ArtifactStatus::Complete);
        assert_eq!(day.status(ArtifactKind::Summary), ArtifactStatus::Missing);
    }

    #[test]
    fn test_failure_bookkeeping() {
        let mut day = DayState::new(
            date(),
            &[ArtifactKind::RawTranscript, ArtifactKind::Insight],
            &ArchiveSnapshot::default(),
            false,
        );

        day.transition(ArtifactKind::RawTranscript, ArtifactStatus::InProgress);
        day.apply(
            ArtifactKind::RawTranscript,
            &StageStep::Failed {
                message: "503".to_string(),
                fatal: false,
            },
        );
        day.transition(ArtifactKind::Insight, ArtifactStatus::InProgress);
        day.apply(
            ArtifactKind::Insight,
            &StageStep::Failed {
                message: "401".to_string(),
                fatal: true,
            },
        );

        assert!(day.has_failures());
        assert!(day.has_retryable_failures());
        assert_eq!(day.reset_failed(), 1);
        assert_eq!(day.status(ArtifactKind::RawTranscript), ArtifactStatus::Missing);
        assert_eq!(day.status(ArtifactKind::Insight), ArtifactStatus::Failed);
        assert!(!day.has_retryable_failures());
        assert_eq!(day.message(ArtifactKind::Insight), Some("401"));
    }

    #[test]
    fn test_waiting_returns_kind_to_missing() {
        let snapshot = ArchiveSnapshot::from_dates([(ArtifactKind::StructuredContent, date())]);
        let mut day = DayState::new(date(), &[ArtifactKind::Analytics], &snapshot, false);

        day.transition(ArtifactKind::Analytics, ArtifactStatus::InProgress);
        day.apply(ArtifactKind::Analytics, &StageStep::Waiting);

        assert_eq!(day.status(ArtifactKind::Analytics), ArtifactStatus::Missing);
        assert!(!day.has_failures());
        let entries = day.into_entries(false);
        assert_eq!(entries[0].outcome, EntryOutcome::Blocked);
    }

    #[test]
    fn test_no_data_and_cancelled_entries() {
        let mut day = DayState::new(
            date(),
            &[ArtifactKind::RawTranscript, ArtifactKind::Summary, ArtifactKind::Insight],
            &ArchiveSnapshot::default(),
            false,
        );
        day.transition(ArtifactKind::RawTranscript, ArtifactStatus::InProgress);
        day.apply(ArtifactKind::RawTranscript, &StageStep::NoData);

        let entries = day.clone().into_entries(false);
        assert_eq!(entries[0].outcome, EntryOutcome::NoData);
        assert_eq!(entries[1].outcome, EntryOutcome::Blocked);
        assert_eq!(
            entries[1].message.as_deref(),
            Some("raw-transcript is missing")
        );
        assert_eq!(entries[2].outcome, EntryOutcome::Blocked);

        let entries = day.into_entries(true);
        assert_eq!(entries[0].outcome, EntryOutcome::NoData);
        assert_eq!(entries[1].outcome, EntryOutcome::Cancelled);
        assert_eq!(entries[2].outcome, EntryOutcome::Cancelled);
    }
}
