//! Integration tests for lifelog-sync
//!
//! These tests run the sync engine against a wiremock server standing in
//! for the remote API, with a temporary directory as the archive root.

mod archive_tests;
mod client_tests;
mod common;
mod sync_tests;
