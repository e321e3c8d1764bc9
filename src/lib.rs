//! lifelog-sync: an incremental, date-partitioned archiver for lifelog data
//!
//! This crate mirrors a user's lifelogs and daily insights from a remote,
//! cursor-paginated API into a local archive with one file per
//! (calendar day, artifact kind), and derives summaries and usage analytics
//! from them. Synchronization is incremental: every run works out which dates
//! are still missing for each artifact kind and only fills those in, in the
//! dependency order the artifact kinds declare.

pub mod archive;
pub mod config;
pub mod ledger;
pub mod remote;
pub mod render;
pub mod retry;
pub mod state;
pub mod sync;

use thiserror::Error;

/// Main error type for lifelog-sync operations
///
/// Per-date failures never surface through this type: they are recorded in
/// the [`RunReport`]. `SyncError` is reserved for setup problems that prevent
/// a run from starting at all.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Archive error: {0}")]
    Archive(#[from] archive::ArchiveError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API credential not found: environment variable {var} is not set")]
    MissingCredential { var: String },

    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),
}

/// Result type alias for lifelog-sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{ArtifactKind, ArtifactStatus};
pub use sync::{run_sync, BatchRunner, DateRange, EntryOutcome, RunReport, SyncRequest};
