//! State module for tracking archive progress
//!
//! This module provides the data model the sync engine reasons about.
//!
//! # Components
//!
//! - `ArtifactKind`: The categories of per-day output and the dependency graph between them
//! - `ArtifactStatus`: The lifecycle of one (date, kind) pair (missing, in progress, complete, failed)

mod artifact_kind;
mod artifact_state;

// Re-export main types
pub use artifact_kind::ArtifactKind;
pub use artifact_state::ArtifactStatus;
