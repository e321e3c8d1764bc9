//! Run ledger
//!
//! An append-only SQLite record of every sync run and the outcome of each
//! (date, kind) pair it looked at. The ledger is history only: gap detection
//! never reads it, the archive itself is the source of truth.

mod schema;
mod sqlite;

pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::SqliteLedger;

use crate::state::ArtifactKind;
use crate::sync::{EntryOutcome, RunReport};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt ledger row: {0}")]
    Corrupt(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Final status of a recorded run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed,
    Interrupted,
}

impl RunStatus {
    /// Status of a finished report; cancellation wins over failures
    pub fn of(report: &RunReport) -> Self {
        if report.was_cancelled() {
            Self::Interrupted
        } else if report.has_failures() {
            Self::Failed
        } else {
            Self::Completed
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

/// Represents a recorded run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: String,
    pub config_hash: String,
    pub status: RunStatus,
    /// Per-outcome entry counts
    pub failed: u64,
    pub written: u64,
}

/// Represents one recorded (date, kind) outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    pub date: NaiveDate,
    pub kind: ArtifactKind,
    pub outcome: EntryOutcome,
    pub attempts: u32,
    pub message: Option<String>,
}
