//! Configuration module for lifelog-sync
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use lifelog_sync::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("lifelog-sync.toml")).unwrap();
//! println!("Archive root: {}", config.archive.root.display());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, ArchiveConfig, Config, RetryConfig, RetrySection, RunnerConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
