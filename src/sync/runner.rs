//! Batch runner - drives a whole sync run
//!
//! The runner takes the archive snapshot once, plans the gaps, then hands
//! each date to a worker task. Dates run concurrently up to the configured
//! limit; the kinds of one date always run sequentially. Every worker's
//! entries come back through a single `JoinSet` and are folded into the
//! [`RunReport`].

use crate::archive::{ArchiveSnapshot, ArchiveStore};
use crate::config::Config;
use crate::remote::{PageFetcher, RemoteApi};
use crate::render::{Renderer, Summarizer};
use crate::retry::{backoff, RetryPolicy};
use crate::state::ArtifactKind;
use crate::sync::gaps::{detect_gaps, fallback_start, yesterday_in, DateRange, GapPlan};
use crate::sync::report::{EntryOutcome, ReportEntry, RunReport};
use crate::sync::rollup::{run_rollups, touched_months};
use crate::sync::stages::{DayState, StageOrchestrator};
use crate::{ConfigError, SyncError};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What a run should cover
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncRequest {
    /// Explicit range; None lets gap detection choose per kind
    pub range: Option<DateRange>,

    /// Kinds to produce; None uses the configured kinds
    pub kinds: Option<Vec<ArtifactKind>>,

    /// Re-produce artifacts even if they are already complete
    pub force: bool,
}

/// Plans runs from an archive snapshot without touching the remote service
#[derive(Clone)]
pub struct RunPlanner {
    store: Arc<dyn ArchiveStore>,
    timezone: Tz,
    kinds: Vec<ArtifactKind>,
    initial_lookback_days: u32,
    upper_bound: Option<NaiveDate>,
}

impl RunPlanner {
    pub fn new(config: &Config, store: Arc<dyn ArchiveStore>) -> Result<Self, ConfigError> {
        Ok(Self {
            store,
            timezone: config.timezone()?,
            kinds: config.runner.kinds.clone(),
            initial_lookback_days: config.archive.initial_lookback_days,
            upper_bound: None,
        })
    }

    /// Pins the last date gap detection may plan, instead of yesterday
    pub fn with_upper_bound(mut self, date: NaiveDate) -> Self {
        self.upper_bound = Some(date);
        self
    }

    /// The last date gap detection may plan
    pub fn upper_bound(&self) -> NaiveDate {
        self.upper_bound
            .unwrap_or_else(|| yesterday_in(self.timezone, Utc::now()))
    }

    fn requested_kinds(&self, request: &SyncRequest) -> Vec<ArtifactKind> {
        request.kinds.clone().unwrap_or_else(|| self.kinds.clone())
    }

    /// Takes the archive snapshot and plans the run
    pub async fn plan(&self, request: &SyncRequest) -> crate::Result<(ArchiveSnapshot, GapPlan)> {
        let store = self.store.clone();
        let snapshot = tokio::task::spawn_blocking(move || ArchiveSnapshot::capture(store.as_ref()))
            .await
            .map_err(|e| SyncError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        let upper_bound = self.upper_bound();
        let plan = detect_gaps(
            &snapshot,
            upper_bound,
            &self.requested_kinds(request),
            request.range,
            fallback_start(upper_bound, self.initial_lookback_days),
        );

        Ok((snapshot, plan))
    }
}

/// Runs the per-date stage orchestration over a planned set of dates
pub struct BatchRunner {
    planner: RunPlanner,
    orchestrator: Arc<StageOrchestrator>,
    store: Arc<dyn ArchiveStore>,
    timezone: Tz,
    day_policy: RetryPolicy,
    max_concurrent_days: usize,
    max_passes_per_day: u32,
    monthly_rollup: bool,
}

impl BatchRunner {
    /// Wires the runner from configuration and its three seams
    pub fn new(
        config: &Config,
        api: Arc<dyn RemoteApi>,
        store: Arc<dyn ArchiveStore>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<Self, ConfigError> {
        let timezone = config.timezone()?;
        let fetcher = Arc::new(PageFetcher::from_config(api, config)?);
        let renderer = Renderer::new(summarizer, timezone);

        Ok(Self {
            planner: RunPlanner::new(config, store.clone())?,
            orchestrator: Arc::new(StageOrchestrator::new(fetcher, store.clone(), renderer)),
            store,
            timezone,
            day_policy: config.retry.day.policy(),
            max_concurrent_days: (config.runner.max_concurrent_days as usize).max(1),
            max_passes_per_day: config.runner.max_passes_per_day.max(1),
            monthly_rollup: config.runner.monthly_rollup,
        })
    }

    /// Pins the last date gap detection may plan, instead of yesterday
    pub fn with_upper_bound(mut self, date: NaiveDate) -> Self {
        self.planner = self.planner.with_upper_bound(date);
        self
    }

    /// Takes the archive snapshot and plans the run without touching the remote
    pub async fn plan(&self, request: &SyncRequest) -> crate::Result<(ArchiveSnapshot, GapPlan)> {
        self.planner.plan(request).await
    }

    /// Runs the sync and reports the outcome of every planned (date, kind) pair
    ///
    /// Only setup problems (an unreadable archive) are returned as errors;
    /// per-date failures are entries in the report.
    pub async fn run(
        &self,
        request: &SyncRequest,
        cancel: CancellationToken,
    ) -> crate::Result<RunReport> {
        let started_at = Utc::now();
        let (snapshot, plan) = self.plan(request).await?;
        let dates = plan.dates();

        for kind in plan.up_to_date() {
            tracing::info!(kind = %kind, "Already up to date");
        }
        for kind_plan in &plan.kinds {
            if let Some(range) = kind_plan.range {
                tracing::info!(kind = %kind_plan.kind, range = %range, "Planned");
            }
        }
        tracing::info!(
            dates = dates.len(),
            upper_bound = %plan.upper_bound,
            concurrency = self.max_concurrent_days,
            "Starting sync run"
        );

        let job = Arc::new(DayJob {
            orchestrator: self.orchestrator.clone(),
            snapshot,
            policy: self.day_policy,
            max_passes: self.max_passes_per_day,
            force: request.force,
            total: dates.len(),
            finished: AtomicUsize::new(0),
        });

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_days));
        let mut tasks: JoinSet<(NaiveDate, Vec<ReportEntry>)> = JoinSet::new();
        let mut pending: BTreeMap<NaiveDate, Vec<ArtifactKind>> = BTreeMap::new();
        let mut entries: Vec<ReportEntry> = Vec::new();

        for date in dates {
            let kinds = plan.kinds_for(date);

            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => permit.ok(),
                _ = cancel.cancelled() => None,
            };
            let permit = match permit {
                Some(permit) if !cancel.is_cancelled() => permit,
                _ => {
                    entries.extend(
                        kinds
                            .iter()
                            .map(|kind| ReportEntry::new(date, *kind, EntryOutcome::Cancelled)),
                    );
                    continue;
                }
            };

            pending.insert(date, kinds.clone());
            let job = job.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let day_entries = job.sync_day(date, &kinds, &cancel).await;
                (date, day_entries)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((date, day_entries)) => {
                    pending.remove(&date);
                    entries.extend(day_entries);
                }
                Err(e) => tracing::error!(error = %e, "Date worker did not finish"),
            }
        }

        for (date, kinds) in pending {
            entries.extend(kinds.into_iter().map(|kind| {
                ReportEntry::new(date, kind, EntryOutcome::Failed)
                    .with_message("worker task panicked")
            }));
        }

        let rollups = if self.monthly_rollup && !cancel.is_cancelled() {
            run_rollups(self.store.clone(), touched_months(&entries), self.timezone).await
        } else {
            Vec::new()
        };

        let report = RunReport::new(
            entries,
            plan.up_to_date(),
            started_at,
            Utc::now(),
            cancel.is_cancelled(),
        )
        .with_rollups(rollups);

        tracing::info!(
            complete = report.count(EntryOutcome::Complete),
            skipped = report.count(EntryOutcome::Skipped),
            failed = report.count(EntryOutcome::Failed),
            rollups = report.rollups().len(),
            cancelled = report.was_cancelled(),
            "Sync run finished"
        );

        Ok(report)
    }
}

/// Shared state of the workers of one run
struct DayJob {
    orchestrator: Arc<StageOrchestrator>,
    snapshot: ArchiveSnapshot,
    policy: RetryPolicy,
    max_passes: u32,
    force: bool,
    total: usize,
    finished: AtomicUsize,
}

impl DayJob {
    /// Brings one date as far as it can go under the day-level retry policy
    async fn sync_day(
        &self,
        date: NaiveDate,
        kinds: &[ArtifactKind],
        cancel: &CancellationToken,
    ) -> Vec<ReportEntry> {
        let mut day = DayState::new(date, kinds, &self.snapshot, self.force);
        let mut retry = self.policy.start();
        let mut cancelled = false;

        loop {
            let attempt = retry.begin();
            tracing::debug!(date = %date, attempt, "Starting day attempt");

            for _ in 0..self.max_passes {
                let pass = self.orchestrator.run_pass(&mut day, cancel).await;
                if pass.cancelled {
                    cancelled = true;
                }
                if pass.cancelled || !pass.changed {
                    break;
                }
            }

            if cancelled || !day.has_retryable_failures() {
                break;
            }

            match retry.record_failure() {
                Some(delay) => {
                    tracing::warn!(
                        date = %date,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Day attempt failed, retrying"
                    );
                    day.reset_failed();
                    if !backoff(delay, cancel).await {
                        cancelled = true;
                        break;
                    }
                }
                None => {
                    tracing::error!(date = %date, attempts = attempt, "Giving up on date");
                    break;
                }
            }
        }

        let entries = day.into_entries(cancelled || cancel.is_cancelled());
        for entry in &entries {
            log_entry(entry);
        }

        let finished = self.finished.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!("Progress: {}/{} dates processed", finished, self.total);

        entries
    }
}

fn log_entry(entry: &ReportEntry) {
    let message = entry.message.as_deref().unwrap_or("");
    match entry.outcome {
        EntryOutcome::Failed => tracing::error!(
            date = %entry.date,
            kind = %entry.kind,
            attempts = entry.attempts,
            error = message,
            "Failed"
        ),
        EntryOutcome::Blocked => tracing::warn!(
            date = %entry.date,
            kind = %entry.kind,
            reason = message,
            "Blocked"
        ),
        outcome => tracing::info!(
            date = %entry.date,
            kind = %entry.kind,
            outcome = %outcome,
            "Done"
        ),
    }
}
