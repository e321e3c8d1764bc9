//! lifelog-sync main entry point
//!
//! This is the command-line interface for the incremental lifelog archiver.

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Parser;
use lifelog_sync::archive::{ArchiveSnapshot, ArchiveStore, FsArchive};
use lifelog_sync::config::{load_config_with_hash, Config};
use lifelog_sync::ledger::SqliteLedger;
use lifelog_sync::sync::{
    build_rollup, detect_missing, print_report, run_sync, DateRange, RunPlanner, SyncRequest,
};
use lifelog_sync::ArtifactKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// lifelog-sync: an incremental lifelog archiver
///
/// Mirrors lifelogs and daily insights from the remote service into a
/// date-partitioned local archive, then derives summaries and usage
/// analytics. Each run fills in only the dates that are still missing.
#[derive(Parser, Debug)]
#[command(name = "lifelog-sync")]
#[command(version)]
#[command(about = "An incremental lifelog archiver", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// First date of an explicit range (YYYY-MM-DD)
    #[arg(long, requires = "end", conflicts_with = "month")]
    start: Option<NaiveDate>,

    /// Last date of an explicit range (YYYY-MM-DD)
    #[arg(long, requires = "start", conflicts_with = "month")]
    end: Option<NaiveDate>,

    /// Sync one calendar month (YYYY-MM)
    #[arg(long, value_parser = DateRange::parse_month)]
    month: Option<DateRange>,

    /// Artifact kind to sync (repeatable; default: the configured kinds)
    #[arg(long = "kind", value_name = "KIND")]
    kinds: Vec<ArtifactKind>,

    /// Re-produce artifacts that are already complete
    #[arg(long)]
    force: bool,

    /// Show which dates would be synced without fetching or writing anything
    #[arg(long, conflicts_with_all = ["status", "history", "rollup"])]
    dry_run: bool,

    /// Show archive coverage per artifact kind and exit
    #[arg(long, conflicts_with_all = ["dry_run", "history", "rollup"])]
    status: bool,

    /// Show recent runs from the ledger and exit
    #[arg(long, conflicts_with_all = ["dry_run", "status", "rollup"])]
    history: bool,

    /// Rebuild one month's usage rollup from the archive and exit (YYYY-MM)
    #[arg(long, value_name = "MONTH", value_parser = DateRange::parse_month,
          conflicts_with_all = ["dry_run", "status", "history"])]
    rollup: Option<DateRange>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn request(&self) -> anyhow::Result<SyncRequest> {
        let range = match (self.start, self.end, self.month) {
            (Some(start), Some(end), _) => Some(DateRange::new(start, end)?),
            (_, _, Some(month)) => Some(month),
            _ => None,
        };

        Ok(SyncRequest {
            range,
            kinds: (!self.kinds.is_empty()).then(|| self.kinds.clone()),
            force: self.force,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let request = cli.request()?;

    if cli.dry_run {
        handle_dry_run(&config, &request).await?;
    } else if let Some(month) = cli.rollup {
        handle_rollup(&config, month)?;
    } else if cli.status {
        handle_status(&config)?;
    } else if cli.history {
        handle_history(&config)?;
    } else {
        return handle_sync(&config, &config_hash, &request).await;
    }

    Ok(ExitCode::SUCCESS)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("lifelog_sync=info,warn"),
            1 => EnvFilter::new("lifelog_sync=debug,info"),
            2 => EnvFilter::new("lifelog_sync=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn capture_snapshot(config: &Config) -> anyhow::Result<ArchiveSnapshot> {
    let archive = FsArchive::new(&config.archive.root);
    ArchiveSnapshot::capture(&archive)
        .with_context(|| format!("failed to scan archive {}", config.archive.root.display()))
}

/// Handles the --dry-run mode: shows the planned ranges per kind
async fn handle_dry_run(config: &Config, request: &SyncRequest) -> anyhow::Result<()> {
    let planner = RunPlanner::new(config, Arc::new(FsArchive::new(&config.archive.root)))?;
    let (snapshot, plan) = planner
        .plan(request)
        .await
        .with_context(|| format!("failed to scan archive {}", config.archive.root.display()))?;

    println!("=== lifelog-sync Dry Run ===\n");
    println!("Archive: {}", config.archive.root.display());
    println!("Timezone: {}", config.archive.timezone);
    println!("Upper bound: {}", plan.upper_bound);
    if request.force {
        println!("Force: existing artifacts would be re-produced");
    }
    println!();

    println!("Planned ranges:");
    for kind_plan in &plan.kinds {
        match kind_plan.range {
            Some(range) => {
                let todo = if request.force {
                    range.num_days()
                } else {
                    detect_missing(&snapshot, kind_plan.kind, range).len()
                };
                println!(
                    "  {}: {} ({} date(s), {} to produce)",
                    kind_plan.kind,
                    range,
                    range.num_days(),
                    todo
                );
            }
            None => println!("  {}: up to date", kind_plan.kind),
        }
    }

    println!(
        "\n✓ Would process {} date(s); nothing was fetched or written",
        plan.dates().len()
    );
    Ok(())
}

/// Handles the --rollup mode: rebuilds one month's usage rollup
fn handle_rollup(config: &Config, month: DateRange) -> anyhow::Result<()> {
    let archive = FsArchive::new(&config.archive.root);
    let days = build_rollup(&archive, month.start, config.timezone()?)
        .with_context(|| format!("failed to build rollup for {}", month.start.format("%Y-%m")))?;

    println!(
        "✓ Wrote {} ({} day(s) with data)",
        archive.rollup_path(month.start).display(),
        days
    );
    Ok(())
}

/// Handles the --status mode: shows archive coverage per kind
fn handle_status(config: &Config) -> anyhow::Result<()> {
    let snapshot = capture_snapshot(config)?;

    println!("=== Archive Status ===\n");
    println!("Archive: {}\n", config.archive.root.display());

    for kind in ArtifactKind::ALL {
        let (first, last) = match (snapshot.earliest(kind), snapshot.latest(kind)) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                println!("{}: no complete artifacts", kind);
                continue;
            }
        };

        let holes = detect_missing(&snapshot, kind, DateRange::new(first, last)?);
        println!(
            "{}: {} complete, {} .. {}",
            kind,
            snapshot.count(kind),
            first,
            last
        );
        if holes.is_empty() {
            println!("  no missing dates");
        } else {
            println!("  {} missing date(s):", holes.len());
            for date in format_runs(&holes) {
                println!("    - {}", date);
            }
        }
    }

    Ok(())
}

/// Collapses consecutive dates into `start .. end` runs
fn format_runs(dates: &[NaiveDate]) -> Vec<String> {
    let mut runs: Vec<(NaiveDate, NaiveDate)> = Vec::new();
    for date in dates {
        match runs.last_mut() {
            Some((_, end)) if end.succ_opt() == Some(*date) => *end = *date,
            _ => runs.push((*date, *date)),
        }
    }
    runs.into_iter()
        .map(|(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{} .. {}", start, end)
            }
        })
        .collect()
}

/// Handles the --history mode: shows recent runs from the ledger
fn handle_history(config: &Config) -> anyhow::Result<()> {
    let path = match &config.archive.ledger_path {
        Some(path) => path,
        None => bail!("no ledger-path is configured in [archive]"),
    };

    let ledger = SqliteLedger::new(path)
        .with_context(|| format!("failed to open ledger {}", path.display()))?;
    let runs = ledger.recent_runs(10)?;

    println!("=== Recent Runs ===\n");
    if runs.is_empty() {
        println!("No runs recorded yet");
        return Ok(());
    }

    for run in &runs {
        println!(
            "#{} {} {} ({} written, {} failed, config {})",
            run.id,
            run.started_at,
            run.status.to_db_string(),
            run.written,
            run.failed,
            &run.config_hash[..run.config_hash.len().min(12)]
        );
    }

    if let Some(latest) = runs.first() {
        let failures: Vec<_> = ledger
            .outcomes_for(latest.id)?
            .into_iter()
            .filter(|o| o.outcome.is_failure())
            .collect();
        if !failures.is_empty() {
            println!("\nFailures in run #{}:", latest.id);
            for failure in failures {
                println!(
                    "  {} {}: {}",
                    failure.date,
                    failure.kind,
                    failure.message.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    Ok(())
}

/// Handles the main sync operation
async fn handle_sync(
    config: &Config,
    config_hash: &str,
    request: &SyncRequest,
) -> anyhow::Result<ExitCode> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight work");
            on_signal.cancel();
        }
    });

    match &request.range {
        Some(range) => tracing::info!("Syncing explicit range {}", range),
        None => tracing::info!("Syncing missing dates up to yesterday"),
    }

    let report = run_sync(config, config_hash, request, cancel)
        .await
        .context("sync could not start")?;

    print_report(&report);
    Ok(ExitCode::from(report.exit_code() as u8))
}
