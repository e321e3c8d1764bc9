//! Local date-partitioned archive
//!
//! This module provides the archive abstraction for lifelog-sync.
//!
//! # Components
//!
//! - `ArchiveStore`: Trait for archive backends
//! - `FsArchive`: Filesystem implementation with atomic writes
//! - `ArchiveSnapshot`: Complete artifacts observed at run start
//! - `IdempotentWriter`: Commits artifacts without rewriting complete work

mod fs;
mod layout;
mod snapshot;
mod traits;
mod writer;

pub use fs::FsArchive;
pub use layout::{artifact_path, check_well_formed, is_temp_file_name, rollup_path};
pub use snapshot::ArchiveSnapshot;
pub use traits::{ArchiveError, ArchiveResult, ArchiveStore};
pub use writer::{IdempotentWriter, WriteOutcome};
