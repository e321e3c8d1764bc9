//! Monthly rollup stage
//!
//! Runs after the daily stages. Every month in which the run wrote a
//! structured-content or analytics artifact gets its rollup rebuilt from all
//! of that month's archived structured content.

use crate::archive::{ArchiveError, ArchiveResult, ArchiveStore};
use crate::render::{month_start, parse_contents, render_monthly, ContentEntry};
use crate::state::ArtifactKind;
use crate::sync::report::{EntryOutcome, ReportEntry, RollupEntry};
use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Months (as their first day) in which this run wrote usage inputs
pub fn touched_months(entries: &[ReportEntry]) -> Vec<NaiveDate> {
    entries
        .iter()
        .filter(|e| e.outcome == EntryOutcome::Complete)
        .filter(|e| matches!(e.kind, ArtifactKind::StructuredContent | ArtifactKind::Analytics))
        .map(|e| month_start(e.date))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Rebuilds and writes the rollup for the month starting at `month`
///
/// Returns the number of days with recorded sessions. Unreadable days are
/// left out with a warning; only a failed write is an error.
pub fn build_rollup(store: &dyn ArchiveStore, month: NaiveDate, timezone: Tz) -> ArchiveResult<usize> {
    let month = month_start(month);
    let dates: Vec<NaiveDate> = store
        .list_dates(ArtifactKind::StructuredContent)?
        .into_iter()
        .filter(|d| d.year() == month.year() && d.month() == month.month())
        .collect();

    let mut days: Vec<(NaiveDate, Vec<ContentEntry>)> = Vec::with_capacity(dates.len());
    for date in dates {
        let entries = match store.read(ArtifactKind::StructuredContent, date) {
            Ok(text) => parse_contents(&text).map_err(|e| e.to_string()),
            Err(e @ ArchiveError::Io { .. }) => return Err(e),
            Err(e) => Err(e.to_string()),
        };
        match entries {
            Ok(entries) => days.push((date, entries)),
            Err(reason) => tracing::warn!(
                date = %date,
                reason = %reason,
                "Leaving unreadable structured content out of the monthly rollup"
            ),
        }
    }

    let report = render_monthly(month, &days, timezone);
    store.write_rollup(month, &report.text)?;
    Ok(report.days_with_data)
}

/// Builds the rollups for `months` on the blocking pool
pub async fn run_rollups(
    store: Arc<dyn ArchiveStore>,
    months: Vec<NaiveDate>,
    timezone: Tz,
) -> Vec<RollupEntry> {
    let mut rollups = Vec::with_capacity(months.len());
    for month in months {
        let task_store = store.clone();
        let result = tokio::task::spawn_blocking(move || {
            build_rollup(task_store.as_ref(), month, timezone)
        })
        .await;

        let entry = match result {
            Ok(Ok(days_with_data)) => {
                tracing::info!(
                    month = %month.format("%Y-%m"),
                    days_with_data,
                    path = %store.rollup_path(month).display(),
                    "Wrote monthly rollup"
                );
                RollupEntry {
                    month,
                    days_with_data,
                    error: None,
                }
            }
            Ok(Err(e)) => rollup_failed(month, e.to_string()),
            Err(e) => rollup_failed(month, format!("rollup task failed: {}", e)),
        };
        rollups.push(entry);
    }
    rollups
}

fn rollup_failed(month: NaiveDate, error: String) -> RollupEntry {
    tracing::error!(month = %month.format("%Y-%m"), error = %error, "Monthly rollup failed");
    RollupEntry {
        month,
        days_with_data: 0,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::FsArchive;
    use tempfile::TempDir;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    fn contents(start: &str, end: &str) -> String {
        format!(
            r#"[{{"lifelog_id":"a","contents":[{{"type":"blockquote","startTime":"{}","endTime":"{}"}}]}}]"#,
            start, end
        )
    }

    #[test]
    fn test_touched_months() {
        let entries = vec![
            ReportEntry::new(d(1, 30), ArtifactKind::StructuredContent, EntryOutcome::Complete),
            ReportEntry::new(d(1, 31), ArtifactKind::Analytics, EntryOutcome::Complete),
            ReportEntry::new(d(2, 1), ArtifactKind::StructuredContent, EntryOutcome::Skipped),
            ReportEntry::new(d(3, 1), ArtifactKind::RawTranscript, EntryOutcome::Complete),
            ReportEntry::new(d(4, 2), ArtifactKind::Analytics, EntryOutcome::Failed),
            ReportEntry::new(d(5, 9), ArtifactKind::StructuredContent, EntryOutcome::Complete),
        ];
        assert_eq!(touched_months(&entries), vec![d(1, 1), d(5, 1)]);
    }

    #[test]
    fn test_build_rollup_reads_whole_month() {
        let dir = TempDir::new().unwrap();
        let archive = FsArchive::new(dir.path());
        archive.ensure_layout().unwrap();
        archive
            .write_atomic(
                ArtifactKind::StructuredContent,
                d(1, 6),
                &contents("2025-01-06T09:00:00Z", "2025-01-06T10:00:00Z"),
            )
            .unwrap();
        archive
            .write_atomic(
                ArtifactKind::StructuredContent,
                d(1, 20),
                &contents("2025-01-20T09:00:00Z", "2025-01-20T09:30:00Z"),
            )
            .unwrap();
        archive
            .write_atomic(
                ArtifactKind::StructuredContent,
                d(2, 1),
                &contents("2025-02-01T09:00:00Z", "2025-02-01T09:30:00Z"),
            )
            .unwrap();
        // Not a JSON array: skipped, not fatal
        std::fs::write(
            archive.path_for(ArtifactKind::StructuredContent, d(1, 21)),
            "{}",
        )
        .unwrap();

        let days = build_rollup(&archive, d(1, 15), chrono_tz::UTC).unwrap();
        assert_eq!(days, 2);

        let text = std::fs::read_to_string(archive.rollup_path(d(1, 1))).unwrap();
        assert!(text.contains("Data processed for 2 out of 31 days"));
        assert!(text.contains("| 2025-01-20 | 1 | 0.50 |"));
        assert!(!text.contains("2025-02-01"));
    }

    #[tokio::test]
    async fn test_run_rollups_reports_each_month() {
        let dir = TempDir::new().unwrap();
        let archive = FsArchive::new(dir.path());
        archive.ensure_layout().unwrap();

        let rollups = run_rollups(Arc::new(archive), vec![d(3, 1)], chrono_tz::UTC).await;
        assert_eq!(
            rollups,
            vec![RollupEntry {
                month: d(3, 1),
                days_with_data: 0,
                error: None,
            }]
        );
        assert!(dir.path().join("analytics/monthly/2025-03-analytics.md").exists());
    }
}
