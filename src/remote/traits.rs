use crate::remote::types::FetchPage;
use crate::state::ArtifactKind;
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// Failure of a remote fetch
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Worth retrying: transport errors, timeouts, 5xx, 429, undecodable bodies
    #[error("transient failure: {0}")]
    Transient(String),

    /// Retrying cannot help: authentication failures and other 4xx responses
    #[error("fatal failure{}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Fatal {
        status: Option<u16>,
        message: String,
    },

    /// The retry budget was spent on transient failures
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    /// The run was cancelled before the fetch completed
    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true if another attempt might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns true if this failure should not be retried at any level
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// Source of cursor-paginated records for one artifact kind and date
///
/// Implementations perform exactly one request per call; retrying,
/// pagination and rate limiting belong to the caller.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetches one page of `kind`'s feed for `date`, starting at `cursor`
    async fn fetch_page(
        &self,
        kind: ArtifactKind,
        date: NaiveDate,
        cursor: Option<&str>,
    ) -> Result<FetchPage, FetchError>;
}
