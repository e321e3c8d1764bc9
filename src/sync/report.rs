//! Run report
//!
//! The outcome of every (date, kind) pair a run looked at, plus the kinds
//! that needed no work. The report is the only channel through which
//! per-date failures leave the engine.

use crate::state::ArtifactKind;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Final outcome of one (date, kind) pair in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryOutcome {
    /// The artifact was produced and written by this run
    Complete,

    /// A well-formed artifact already existed
    Skipped,

    /// The remote service had nothing for this date
    NoData,

    /// Retries were exhausted or a fatal error occurred
    Failed,

    /// The upstream artifact never became available (without failing)
    Blocked,

    /// The run was cancelled before this pair was finished
    Cancelled,
}

impl EntryOutcome {
    pub const ALL: [EntryOutcome; 6] = [
        Self::Complete,
        Self::Skipped,
        Self::NoData,
        Self::Failed,
        Self::Blocked,
        Self::Cancelled,
    ];

    /// Returns true only for `Failed`
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns true if a complete artifact exists after the run
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Complete | Self::Skipped)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Skipped => "skipped",
            Self::NoData => "no_data",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.to_db_string() == s)
    }
}

impl fmt::Display for EntryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// One (date, kind) line of the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub date: NaiveDate,
    pub kind: ArtifactKind,
    pub outcome: EntryOutcome,
    /// Times this run tried to produce the artifact (0 if never attempted)
    pub attempts: u32,
    pub message: Option<String>,
}

impl ReportEntry {
    pub fn new(date: NaiveDate, kind: ArtifactKind, outcome: EntryOutcome) -> Self {
        Self {
            date,
            kind,
            outcome,
            attempts: 0,
            message: None,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Outcome of one monthly rollup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupEntry {
    /// First day of the month
    pub month: NaiveDate,
    /// Days of the month with recorded sessions
    pub days_with_data: usize,
    pub error: Option<String>,
}

/// Outcome of a whole run; immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    entries: Vec<ReportEntry>,
    up_to_date: Vec<ArtifactKind>,
    rollups: Vec<RollupEntry>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    cancelled: bool,
}

impl RunReport {
    /// Builds the report, ordering entries by date then dependency order
    pub fn new(
        mut entries: Vec<ReportEntry>,
        mut up_to_date: Vec<ArtifactKind>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        cancelled: bool,
    ) -> Self {
        entries.sort_by_key(|e| (e.date, e.kind));
        up_to_date.sort();
        up_to_date.dedup();
        Self {
            entries,
            up_to_date,
            rollups: Vec::new(),
            started_at,
            finished_at,
            cancelled,
        }
    }

    /// Attaches the monthly rollups produced after the daily stages
    pub fn with_rollups(mut self, mut rollups: Vec<RollupEntry>) -> Self {
        rollups.sort_by_key(|r| r.month);
        self.rollups = rollups;
        self
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn rollups(&self) -> &[RollupEntry] {
        &self.rollups
    }

    /// Kinds that had nothing to do this run
    pub fn up_to_date(&self) -> &[ArtifactKind] {
        &self.up_to_date
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Returns true if the run was interrupted
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn has_failures(&self) -> bool {
        self.entries.iter().any(|e| e.outcome.is_failure())
            || self.rollups.iter().any(|r| r.error.is_some())
    }

    /// Process exit code: 1 if any entry or rollup failed, else 0
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }

    pub fn count(&self, outcome: EntryOutcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    pub fn entry(&self, date: NaiveDate, kind: ArtifactKind) -> Option<&ReportEntry> {
        self.entries
            .iter()
            .find(|e| e.date == date && e.kind == kind)
    }

    /// Dates with at least one failed entry, ascending
    pub fn failed_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .entries
            .iter()
            .filter(|e| e.outcome.is_failure())
            .map(|e| e.date)
            .collect();
        dates.dedup();
        dates
    }

    /// Dates of `kind` that ended with `outcome`, ascending
    pub fn dates_with(&self, kind: ArtifactKind, outcome: EntryOutcome) -> Vec<NaiveDate> {
        self.entries
            .iter()
            .filter(|e| e.kind == kind && e.outcome == outcome)
            .map(|e| e.date)
            .collect()
    }

    /// Per-kind counts of each outcome
    pub fn counts_by_kind(&self) -> BTreeMap<ArtifactKind, BTreeMap<EntryOutcome, usize>> {
        let mut counts: BTreeMap<ArtifactKind, BTreeMap<EntryOutcome, usize>> = BTreeMap::new();
        for entry in &self.entries {
            *counts
                .entry(entry.kind)
                .or_default()
                .entry(entry.outcome)
                .or_default() += 1;
        }
        counts
    }
}

/// Prints the report to stdout in a formatted manner
pub fn print_report(report: &RunReport) {
    println!("=== Sync Report ===\n");

    let elapsed = report.finished_at - report.started_at;
    println!("Overview:");
    println!("  Entries: {}", report.entries.len());
    for outcome in EntryOutcome::ALL {
        let count = report.count(outcome);
        if count > 0 {
            println!("  {}: {}", outcome, count);
        }
    }
    println!("  Duration: {}s", elapsed.num_seconds());
    if report.cancelled {
        println!("  Run was cancelled before completion");
    }
    println!();

    if !report.up_to_date.is_empty() {
        println!("Up to date:");
        for kind in &report.up_to_date {
            println!("  - {}", kind);
        }
        println!();
    }

    let counts = report.counts_by_kind();
    if !counts.is_empty() {
        println!("By kind:");
        for (kind, outcomes) in &counts {
            let parts: Vec<String> = outcomes
                .iter()
                .map(|(outcome, count)| format!("{} {}", count, outcome))
                .collect();
            println!("  {}: {}", kind, parts.join(", "));
        }
        println!();
    }

    if !report.rollups.is_empty() {
        println!("Monthly rollups:");
        for rollup in &report.rollups {
            match &rollup.error {
                Some(error) => println!("  {}: FAILED: {}", rollup.month.format("%Y-%m"), error),
                None => println!(
                    "  {}: {} day(s) with data",
                    rollup.month.format("%Y-%m"),
                    rollup.days_with_data
                ),
            }
        }
        println!();
    }

    let problems: Vec<&ReportEntry> = report
        .entries
        .iter()
        .filter(|e| matches!(e.outcome, EntryOutcome::Failed | EntryOutcome::Blocked))
        .collect();
    if !problems.is_empty() {
        println!("Needs attention:");
        for entry in problems {
            println!(
                "  {} {} {} (attempts: {}){}",
                entry.date,
                entry.kind,
                entry.outcome,
                entry.attempts,
                entry
                    .message
                    .as_deref()
                    .map(|m| format!(": {}", m))
                    .unwrap_or_default()
            );
        }
        println!();
    }

    if report.has_failures() {
        println!(
            "Result: FAILED ({} date(s) with failures, {} failed rollup(s))",
            report.failed_dates().len(),
            report.rollups.iter().filter(|r| r.error.is_some()).count()
        );
    } else {
        println!("Result: OK");
    }
}
