//! Gap detection
//!
//! Works out, per artifact kind, which contiguous range of dates a run
//! should attempt. Detection is a pure function of the archive snapshot, the
//! upper bound and the requested kinds.
//!
//! # Rules (per kind, no explicit range)
//!
//! | Archive state | Range start |
//! |---------------|-------------|
//! | kind has complete dates | day after the latest one |
//! | kind empty, an upstream in its chain has dates | earliest upstream date |
//! | root kind empty, raw transcripts exist | earliest raw-transcript date |
//! | nothing usable | `fallback_start` |
//!
//! The range always ends at `upper_bound`. If the start lies after it the
//! kind is up to date.

use crate::archive::ArchiveSnapshot;
use crate::state::ArtifactKind;
use crate::SyncError;
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::fmt;

/// An inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> crate::Result<Self> {
        if start > end {
            return Err(SyncError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Every day of a calendar month
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            start,
            end: next.pred_opt()?,
        })
    }

    /// Parses `YYYY-MM` into the month's range
    pub fn parse_month(value: &str) -> Result<Self, String> {
        let first = NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d")
            .map_err(|_| format!("invalid month '{}', expected YYYY-MM", value))?;
        Self::month(first.year(), first.month())
            .ok_or_else(|| format!("month '{}' is out of range", value))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days in the range
    pub fn num_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    /// Each date of the range, ascending
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}..={}", self.start, self.end)
        }
    }
}

/// The range one kind will be attempted over; None means up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindPlan {
    pub kind: ArtifactKind,
    pub range: Option<DateRange>,
}

/// Result of gap detection for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapPlan {
    pub upper_bound: NaiveDate,
    pub kinds: Vec<KindPlan>,
}

impl GapPlan {
    pub fn range_for(&self, kind: ArtifactKind) -> Option<DateRange> {
        self.kinds
            .iter()
            .find(|plan| plan.kind == kind)
            .and_then(|plan| plan.range)
    }

    /// Ascending union of every kind's dates
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates = BTreeSet::new();
        for range in self.kinds.iter().filter_map(|plan| plan.range) {
            dates.extend(range.days());
        }
        dates.into_iter().collect()
    }

    /// Kinds whose range includes `date`, in dependency order
    pub fn kinds_for(&self, date: NaiveDate) -> Vec<ArtifactKind> {
        let mut kinds: Vec<ArtifactKind> = self
            .kinds
            .iter()
            .filter(|plan| plan.range.map_or(false, |r| r.contains(date)))
            .map(|plan| plan.kind)
            .collect();
        kinds.sort();
        kinds
    }

    /// Kinds with nothing to do
    pub fn up_to_date(&self) -> Vec<ArtifactKind> {
        self.kinds
            .iter()
            .filter(|plan| plan.range.is_none())
            .map(|plan| plan.kind)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.iter().all(|plan| plan.range.is_none())
    }
}

/// The last fully elapsed day in `timezone`
pub fn yesterday_in(timezone: Tz, now: DateTime<Utc>) -> NaiveDate {
    let today = now.with_timezone(&timezone).date_naive();
    today.pred_opt().unwrap_or(today)
}

/// First day of the initial window for an empty archive
///
/// A lookback of N days ends at `upper_bound` and includes it.
pub fn fallback_start(upper_bound: NaiveDate, lookback_days: u32) -> NaiveDate {
    upper_bound
        .checked_sub_days(Days::new(u64::from(lookback_days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

/// Earliest date the kind could have data for, judged from the archive
fn earliest_candidate(snapshot: &ArchiveSnapshot, kind: ArtifactKind) -> Option<NaiveDate> {
    let mut upstream = kind.upstream();
    while let Some(up) = upstream {
        if let Some(earliest) = snapshot.earliest(up) {
            return Some(earliest);
        }
        upstream = up.upstream();
    }
    snapshot.earliest(ArtifactKind::RawTranscript)
}

/// Plans the range of dates to attempt for each requested kind
pub fn detect_gaps(
    snapshot: &ArchiveSnapshot,
    upper_bound: NaiveDate,
    kinds: &[ArtifactKind],
    explicit: Option<DateRange>,
    fallback_start: NaiveDate,
) -> GapPlan {
    let mut requested: Vec<ArtifactKind> = kinds.to_vec();
    requested.sort();
    requested.dedup();

    let plans = requested
        .into_iter()
        .map(|kind| {
            let range = match explicit {
                Some(range) => Some(range),
                None => {
                    let start = match snapshot.latest(kind) {
                        Some(latest) => latest.succ_opt(),
                        None => Some(earliest_candidate(snapshot, kind).unwrap_or(fallback_start)),
                    };
                    start
                        .filter(|start| *start <= upper_bound)
                        .map(|start| DateRange {
                            start,
                            end: upper_bound,
                        })
                }
            };
            KindPlan { kind, range }
        })
        .collect();

    GapPlan {
        upper_bound,
        kinds: plans,
    }
}

/// Dates inside `range` with no complete artifact of `kind`
pub fn detect_missing(
    snapshot: &ArchiveSnapshot,
    kind: ArtifactKind,
    range: DateRange,
) -> Vec<NaiveDate> {
    range
        .days()
        .filter(|date| !snapshot.is_complete(kind, *date))
        .collect()
}
