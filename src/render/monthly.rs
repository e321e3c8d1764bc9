//! Monthly usage rollup over the structured-content artifacts of one month

use crate::render::analytics::{
    busiest_hour, duration_histogram, extract_sessions, hour_range, hourly_activity,
    write_distribution, Distribution, Session,
};
use crate::render::contents::ContentEntry;
use chrono::{Datelike, Months, NaiveDate};
use chrono_tz::Tz;
use std::fmt::Write as _;

/// Recording totals of one day in the month
#[derive(Debug, Clone, PartialEq)]
pub struct DayTotals {
    pub date: NaiveDate,
    pub sessions: usize,
    pub hours: f64,
}

/// A rendered monthly rollup
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyReport {
    /// Days of the month with at least one recorded session
    pub days_with_data: usize,
    pub text: String,
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Number of days in the month starting at `month`
pub fn days_in_month(month: NaiveDate) -> u32 {
    month
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map_or(31, |last| last.day())
}

/// Renders the rollup for `month` from each archived day's content entries
///
/// `days` holds the days that have a structured-content artifact; days
/// without timestamped sessions count as days without data.
pub fn render_monthly(
    month: NaiveDate,
    days: &[(NaiveDate, Vec<ContentEntry>)],
    timezone: Tz,
) -> MonthlyReport {
    let month = month_start(month);

    let mut totals: Vec<DayTotals> = Vec::new();
    let mut all_sessions: Vec<Session> = Vec::new();
    for (date, entries) in days {
        let sessions = extract_sessions(entries);
        if sessions.is_empty() {
            continue;
        }
        let minutes: f64 = sessions.iter().map(Session::minutes).sum();
        totals.push(DayTotals {
            date: *date,
            sessions: sessions.len(),
            hours: minutes / 60.0,
        });
        all_sessions.extend(sessions);
    }
    totals.sort_by_key(|t| t.date);

    MonthlyReport {
        days_with_data: totals.len(),
        text: write_report(month, &totals, &all_sessions, timezone),
    }
}

fn write_report(
    month: NaiveDate,
    totals: &[DayTotals],
    all_sessions: &[Session],
    timezone: Tz,
) -> String {
    let label = month.format("%Y-%m");

    let mut out = String::new();
    let _ = writeln!(out, "# Monthly Usage Analytics for {}\n", label);
    let _ = writeln!(
        out,
        "Data processed for {} out of {} days in the month.\n",
        totals.len(),
        days_in_month(month)
    );

    if totals.is_empty() {
        let _ = writeln!(out, "No recording data found for {}.", label);
        return out;
    }

    let daily_hours: Vec<f64> = totals.iter().map(|t| t.hours).collect();
    let daily_sessions: Vec<f64> = totals.iter().map(|t| t.sessions as f64).collect();
    let (hours, sessions) = match (
        Distribution::of(&daily_hours),
        Distribution::of(&daily_sessions),
    ) {
        (Some(hours), Some(sessions)) => (hours, sessions),
        _ => return out,
    };

    let _ = writeln!(out, "## Overview\n");
    let _ = writeln!(
        out,
        "- Total recorded time: {:.2} hours",
        daily_hours.iter().sum::<f64>()
    );
    let _ = writeln!(
        out,
        "- Average daily recorded time: {:.2} hours/day (std dev: {})",
        hours.mean,
        hours.std_dev.map_or_else(|| "n/a".to_string(), |s| format!("{:.2}", s))
    );
    let _ = writeln!(out, "- Recording sessions: {}", all_sessions.len());
    let _ = writeln!(out, "- Average daily sessions: {:.2}\n", sessions.mean);

    let _ = writeln!(out, "## Daily Trends\n");
    let _ = writeln!(out, "| Date | Sessions | Recorded hours |");
    let _ = writeln!(out, "|---|---|---|");
    for day in totals {
        let _ = writeln!(out, "| {} | {} | {:.2} |", day.date, day.sessions, day.hours);
    }

    let minutes: Vec<f64> = all_sessions.iter().map(Session::minutes).collect();
    if let Some(durations) = Distribution::of(&minutes) {
        let _ = writeln!(out, "\n## Session Durations (minutes)\n");
        write_distribution(&mut out, &durations);
    }

    let _ = writeln!(out, "\n## Duration Distribution\n");
    let _ = writeln!(out, "| Duration | Sessions |");
    let _ = writeln!(out, "|---|---|");
    for (label, count) in duration_histogram(&minutes) {
        let _ = writeln!(out, "| {} | {} |", label, count);
    }

    let (hour_minutes, sessions_per_hour) = hourly_activity(all_sessions, timezone);
    if let Some((hour, minutes)) = busiest_hour(&hour_minutes) {
        let _ = writeln!(
            out,
            "\n## Busiest Hour\n\n{} with {:.2} total minutes of recording",
            hour_range(hour),
            minutes
        );
    }

    let _ = writeln!(out, "\n## Sessions Started Per Hour\n");
    for (hour, count) in &sessions_per_hour {
        let _ = writeln!(out, "- {}: {} session(s)", hour_range(*hour), count);
    }

    // max_by/min_by keep the last/first of equal values; report the earliest day on ties
    let most = totals
        .iter()
        .rev()
        .max_by(|a, b| a.hours.total_cmp(&b.hours));
    let least = totals.iter().min_by(|a, b| a.hours.total_cmp(&b.hours));
    if let (Some(most), Some(least)) = (most, least) {
        let _ = writeln!(out, "\n## Daily Extremes\n");
        let _ = writeln!(
            out,
            "- Most recorded: {} ({:.2} hours from {} sessions)",
            most.date, most.hours, most.sessions
        );
        let _ = writeln!(
            out,
            "- Least recorded: {} ({:.2} hours from {} sessions)",
            least.date, least.hours, least.sessions
        );
    }

    out
}
