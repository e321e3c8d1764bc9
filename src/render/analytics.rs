//! Usage analytics derived from the structured-content artifact
//!
//! A session is one lifelog's recorded span: from the start of its first
//! timestamped, non-heading content node to the end of its last one. The
//! report aggregates those spans for the day.

use crate::remote::ContentNode;
use crate::render::contents::ContentEntry;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Timelike};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Upper bounds (minutes, exclusive) of the duration histogram buckets
const BUCKETS: [(f64, &str); 6] = [
    (1.0, "<1 min"),
    (5.0, "1-5 min"),
    (15.0, "5-15 min"),
    (30.0, "15-30 min"),
    (60.0, "30-60 min"),
    (f64::INFINITY, ">60 min"),
];

/// The recorded span of one lifelog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl Session {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub(crate) fn minutes(&self) -> f64 {
        self.duration().num_milliseconds() as f64 / 60_000.0
    }
}

/// Mean, median, sample standard deviation, min and max of a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distribution {
    pub mean: f64,
    pub median: f64,
    pub std_dev: Option<f64>,
    pub min: f64,
    pub max: f64,
}

impl Distribution {
    pub(crate) fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        let std_dev = (n > 1).then(|| {
            let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            variance.sqrt()
        });

        Some(Self {
            mean,
            median,
            std_dev,
            min: sorted[0],
            max: sorted[n - 1],
        })
    }
}

/// Aggregate usage for one day
#[derive(Debug, Clone, PartialEq)]
pub struct UsageStats {
    pub sessions: usize,
    pub first_start: DateTime<Tz>,
    pub last_end: DateTime<Tz>,
    pub total_minutes: f64,
    pub active_span_minutes: f64,
    /// Recorded time as a percentage of the active span
    pub recording_ratio: f64,
    pub durations: Distribution,
    pub histogram: Vec<(&'static str, usize)>,
    pub gaps: Option<Distribution>,
    /// Hour of day (local) with the most recorded time, and those minutes
    pub busiest_hour: (u32, f64),
    /// Sessions started per local hour of day
    pub sessions_per_hour: BTreeMap<u32, usize>,
}

/// Extracts one session per lifelog that has timestamped content
///
/// Lifelogs whose timestamps cannot be parsed are skipped with a warning.
pub fn extract_sessions(entries: &[ContentEntry]) -> Vec<Session> {
    let mut sessions = Vec::new();

    for entry in entries {
        let mut timed = Vec::new();
        collect_timed(&entry.contents, &mut timed);

        let (first, last) = match (timed.first(), timed.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => continue,
        };

        match session_span(first, last) {
            Some(session) => sessions.push(session),
            None => tracing::warn!(
                lifelog_id = %entry.lifelog_id,
                "Could not parse content timestamps, leaving lifelog out of analytics"
            ),
        }
    }

    sessions
}

fn collect_timed<'a>(nodes: &'a [ContentNode], out: &mut Vec<&'a ContentNode>) {
    for node in nodes {
        if node.start_time.is_some() && !node.is_heading() {
            out.push(node);
        }
        collect_timed(&node.children, out);
    }
}

fn parse_time(value: Option<&str>) -> Option<DateTime<FixedOffset>> {
    value
        .filter(|v| !v.is_empty())
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
}

fn session_span(first: &ContentNode, last: &ContentNode) -> Option<Session> {
    let start = parse_time(first.start_time.as_deref())?;
    let mut end = match parse_time(last.end_time.as_deref()) {
        Some(end) => end,
        None => parse_time(last.start_time.as_deref())?,
    };

    if end < start {
        end = match parse_time(first.end_time.as_deref()) {
            Some(first_end) if first_end >= start => first_end,
            _ => start + Duration::seconds(1),
        };
    }

    Some(Session { start, end })
}

/// Computes the day's statistics; None when there are no sessions
pub fn compute_stats(sessions: &[Session], timezone: Tz) -> Option<UsageStats> {
    let mut sorted = sessions.to_vec();
    sorted.sort_by_key(|s| s.start);

    let first_start = sorted.first()?.start;
    let last_end = sorted.iter().map(|s| s.end).max()?;

    let minutes: Vec<f64> = sorted.iter().map(Session::minutes).collect();
    let total_minutes: f64 = minutes.iter().sum();
    let active_span_minutes = (last_end - first_start).num_milliseconds() as f64 / 60_000.0;
    let recording_ratio = if active_span_minutes > 0.0 {
        total_minutes / active_span_minutes * 100.0
    } else {
        0.0
    };

    let histogram = duration_histogram(&minutes);

    let gap_minutes: Vec<f64> = sorted
        .windows(2)
        .map(|w| (w[1].start - w[0].end).num_milliseconds() as f64 / 60_000.0)
        .filter(|gap| *gap >= 0.0)
        .collect();

    let (hour_minutes, sessions_per_hour) = hourly_activity(&sorted, timezone);
    let busiest_hour = busiest_hour(&hour_minutes)?;

    Some(UsageStats {
        sessions: sorted.len(),
        first_start: first_start.with_timezone(&timezone),
        last_end: last_end.with_timezone(&timezone),
        total_minutes,
        active_span_minutes,
        recording_ratio,
        durations: Distribution::of(&minutes)?,
        histogram,
        gaps: Distribution::of(&gap_minutes),
        busiest_hour,
        sessions_per_hour,
    })
}

/// Session counts per duration bucket, in bucket order
pub(crate) fn duration_histogram(minutes: &[f64]) -> Vec<(&'static str, usize)> {
    BUCKETS
        .iter()
        .enumerate()
        .map(|(i, (upper, label))| {
            let lower = if i == 0 { f64::NEG_INFINITY } else { BUCKETS[i - 1].0 };
            let count = minutes.iter().filter(|m| **m >= lower && **m < *upper).count();
            (*label, count)
        })
        .collect()
}

/// Recorded minutes and sessions started, keyed by local hour of the session start
pub(crate) fn hourly_activity(
    sessions: &[Session],
    timezone: Tz,
) -> (BTreeMap<u32, f64>, BTreeMap<u32, usize>) {
    let mut hour_minutes: BTreeMap<u32, f64> = BTreeMap::new();
    let mut sessions_per_hour: BTreeMap<u32, usize> = BTreeMap::new();
    for session in sessions {
        let hour = session.start.with_timezone(&timezone).hour();
        *hour_minutes.entry(hour).or_default() += session.minutes();
        *sessions_per_hour.entry(hour).or_default() += 1;
    }
    (hour_minutes, sessions_per_hour)
}

/// The hour with the most recorded minutes; ties go to the earliest hour
pub(crate) fn busiest_hour(hour_minutes: &BTreeMap<u32, f64>) -> Option<(u32, f64)> {
    hour_minutes
        .iter()
        .fold(None::<(u32, f64)>, |best, (hour, mins)| match best {
            Some((_, best_mins)) if best_mins >= *mins => best,
            _ => Some((*hour, *mins)),
        })
}

pub(crate) fn hour_range(hour: u32) -> String {
    format!("{:02}:00 - {:02}:00", hour, (hour + 1) % 24)
}

pub(crate) fn write_distribution(out: &mut String, dist: &Distribution) {
    let _ = writeln!(out, "- Mean: {:.2}", dist.mean);
    let _ = writeln!(out, "- Median: {:.2}", dist.median);
    match dist.std_dev {
        Some(std_dev) => {
            let _ = writeln!(out, "- Standard deviation: {:.2}", std_dev);
        }
        None => {
            let _ = writeln!(out, "- Standard deviation: n/a");
        }
    }
    let _ = writeln!(out, "- Shortest: {:.2}", dist.min);
    let _ = writeln!(out, "- Longest: {:.2}", dist.max);
}

/// Renders the analytics report for `date`
pub fn render_analytics(date: NaiveDate, entries: &[ContentEntry], timezone: Tz) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Usage Analytics for {}\n", date.format("%Y-%m-%d"));

    let sessions = extract_sessions(entries);
    let stats = match compute_stats(&sessions, timezone) {
        Some(stats) => stats,
        None => {
            let _ = writeln!(
                out,
                "No recording sessions found for {} ({} lifelogs without timestamped content).",
                date.format("%Y-%m-%d"),
                entries.len()
            );
            return out;
        }
    };

    let _ = writeln!(out, "## Overview\n");
    let _ = writeln!(
        out,
        "- Recording window: {} to {} ({})",
        stats.first_start.format("%Y-%m-%d %H:%M:%S"),
        stats.last_end.format("%Y-%m-%d %H:%M:%S"),
        timezone.name()
    );
    let _ = writeln!(
        out,
        "- Active recording span: {:.2} hours",
        stats.active_span_minutes / 60.0
    );
    let _ = writeln!(
        out,
        "- Total recorded time: {:.2} hours ({:.2} minutes)",
        stats.total_minutes / 60.0,
        stats.total_minutes
    );
    let _ = writeln!(
        out,
        "- Recorded time / active span: {:.2}%",
        stats.recording_ratio
    );
    let _ = writeln!(out, "- Recording sessions: {}\n", stats.sessions);

    let _ = writeln!(out, "## Session Durations (minutes)\n");
    write_distribution(&mut out, &stats.durations);

    let _ = writeln!(out, "\n## Duration Distribution\n");
    let _ = writeln!(out, "| Duration | Sessions |");
    let _ = writeln!(out, "|---|---|");
    for (label, count) in &stats.histogram {
        let _ = writeln!(out, "| {} | {} |", label, count);
    }

    if stats.sessions > 1 {
        let _ = writeln!(out, "\n## Gaps Between Sessions (minutes)\n");
        match &stats.gaps {
            Some(gaps) => write_distribution(&mut out, gaps),
            None => {
                let _ = writeln!(out, "- No gaps between sessions (sessions overlap).");
            }
        }
    }

    let (hour, minutes) = stats.busiest_hour;
    let _ = writeln!(
        out,
        "\n## Busiest Hour\n\n{} with {:.2} minutes of recording",
        hour_range(hour),
        minutes
    );

    let _ = writeln!(out, "\n## Sessions Started Per Hour\n");
    for (hour, count) in &stats.sessions_per_hour {
        let _ = writeln!(out, "- {}: {} session(s)", hour_range(*hour), count);
    }

    out
}
