//! Sync engine
//!
//! - `gaps`: plans which dates each artifact kind still needs
//! - `stages`: advances one date's kinds in dependency order
//! - `runner`: drives all planned dates with day-level retry
//! - `rollup`: rebuilds the monthly usage rollups a run touched
//! - `report`: the outcome of a run

mod gaps;
mod report;
mod rollup;
mod runner;
mod stages;

pub use gaps::{
    detect_gaps, detect_missing, fallback_start, yesterday_in, DateRange, GapPlan, KindPlan,
};
pub use report::{print_report, EntryOutcome, ReportEntry, RollupEntry, RunReport};
pub use rollup::{build_rollup, run_rollups, touched_months};
pub use runner::{BatchRunner, RunPlanner, SyncRequest};
pub use stages::{DayState, PassResult, StageOrchestrator, StageStep};

use crate::archive::FsArchive;
use crate::config::Config;
use crate::ledger::SqliteLedger;
use crate::remote::HttpRemoteApi;
use crate::render::OutlineSummarizer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a sync against the configured remote service and archive
///
/// Prepares the archive root, removes temporary files left by interrupted
/// writes, runs the batch and records the report in the ledger when one is
/// configured. A ledger failure is logged; it never changes the report.
pub async fn run_sync(
    config: &Config,
    config_hash: &str,
    request: &SyncRequest,
    cancel: CancellationToken,
) -> crate::Result<RunReport> {
    let timezone = config.timezone()?;
    let api = Arc::new(HttpRemoteApi::from_env(&config.api, timezone)?);

    let archive = FsArchive::new(&config.archive.root);
    archive.ensure_layout()?;
    let swept = archive.sweep_temp_files()?;
    if swept > 0 {
        tracing::info!(count = swept, "Removed temporary files from interrupted writes");
    }

    let runner = BatchRunner::new(config, api, Arc::new(archive), Arc::new(OutlineSummarizer))?;
    let report = runner.run(request, cancel).await?;

    if let Some(path) = &config.archive.ledger_path {
        match SqliteLedger::new(path).and_then(|mut ledger| ledger.record_run(&report, config_hash)) {
            Ok(run_id) => tracing::info!(run_id, path = %path.display(), "Recorded run in ledger"),
            Err(e) => tracing::error!(error = %e, path = %path.display(), "Failed to record run in ledger"),
        }
    }

    Ok(report)
}
